pub mod credentials;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod uri;

pub use credentials::{Role, RoleCredentials};
pub use error::{classify, GatewayError, GatewayResult};
pub use gateway::{Gateway, Listing, StorageOptions};
pub use retry::RetryPolicy;
pub use uri::{object_path_from_url, parse_uri, ParsedUri};

pub use object_store::path::Path as ObjectPath;
pub use object_store::ObjectMeta;
