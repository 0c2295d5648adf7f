//! HTTP handlers for the generic REST surface.

pub mod rest;
