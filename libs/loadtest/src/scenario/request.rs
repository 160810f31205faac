use serde::{Deserialize, Serialize};

/// One element of the upsert body, `[{"code": "ABCDE"}]`.
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Clone)]
pub struct ChannelInput {
    pub code: String,
}
