use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "cluster")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub description: Option<String>,
    pub odb_type: String, // 'postgresql', 'sqlite'
    pub odb_host: Option<String>,
    pub odb_port: Option<i32>,
    pub odb_db_name: Option<String>,
    pub lb_host: String,
    pub lb_port: i32,
    pub lb_agent_port: i32,
    pub owner: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::admin_principal::Entity",
        from = "Column::Owner",
        to = "super::admin_principal::Column::Username"
    )]
    AdminPrincipal,
    #[sea_orm(has_many = "super::server::Entity")]
    Server,
}

impl Related<super::admin_principal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AdminPrincipal.def()
    }
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
