//! 领域模型

mod campaign;
mod request;

pub use campaign::{Campaign, CampaignDocument, CampaignIdDocument, CampaignSummary, RawTargeting};
pub use request::{DimensionQuery, PageRequest};
