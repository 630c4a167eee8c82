pub mod google;
pub mod notion;
pub mod oauth;
pub mod traits;

pub use google::CalendarClient;
pub use notion::NotionClient;
pub use oauth::{
    consent_url, AccessToken, CachedTokenProvider, ServiceAccountKey, ServiceAccountSigner,
    TokenSource,
};
pub use traits::{RecordStore, WriteBack};
