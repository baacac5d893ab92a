use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Membership of one server in a cluster.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "server")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cluster_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub bind_host: String,
    pub bind_port: i32,
    #[serde(skip_serializing)]
    pub token: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cluster::Entity",
        from = "Column::ClusterName",
        to = "super::cluster::Column::Name"
    )]
    Cluster,
}

impl Related<super::cluster::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cluster.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
