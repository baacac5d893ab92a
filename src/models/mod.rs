pub mod admin_principal;
pub mod cluster;
pub mod quickstart_status;
pub mod server;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::admin_principal::{self, Entity as AdminPrincipal};
    pub use super::cluster::{self, Entity as Cluster};
    pub use super::quickstart_status::{self, Entity as QuickstartStatus};
    pub use super::server::{self, Entity as Server};
}
