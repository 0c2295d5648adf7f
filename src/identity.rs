//! The authenticated caller, as established by the surrounding
//! authentication layer and consumed by the save pipeline.

/// Identity attached to every request. Authentication middleware places one
/// in the request extensions; when none is present the anonymous identity
/// (id 0) applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiUser {
    pub id: i64,
    pub name: Option<String>,
    pub organization: Option<i64>,
}

impl ApiUser {
    pub fn anonymous() -> Self {
        ApiUser { id: 0, name: None, organization: None }
    }

    pub fn with_id(id: i64) -> Self {
        ApiUser { id, name: None, organization: None }
    }
}

impl Default for ApiUser {
    fn default() -> Self {
        ApiUser::anonymous()
    }
}
