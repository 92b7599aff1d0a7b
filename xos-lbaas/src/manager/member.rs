//! Member manager. XOS derives pool membership on its own, so nothing is
//! forwarded yet.

use async_trait::async_trait;
use tracing::debug;

use super::EntityManager;
use crate::error::Result;
use crate::model::{Context, Member};
use crate::resource::member_path;

#[derive(Clone, Default)]
pub struct MemberManager;

impl MemberManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EntityManager for MemberManager {
    type Entity = Member;

    async fn create(&self, _ctx: &Context, member: &Member) -> Result<()> {
        debug!(path = %member_path(&member.pool_id, None), "Member create not forwarded");
        Ok(())
    }

    async fn update(&self, _ctx: &Context, _old: &Member, member: &Member) -> Result<()> {
        debug!(
            path = %member_path(&member.pool_id, Some(&member.id)),
            "Member update not forwarded"
        );
        Ok(())
    }

    async fn delete(&self, _ctx: &Context, member: &Member) -> Result<()> {
        debug!(
            path = %member_path(&member.pool_id, Some(&member.id)),
            "Member delete not forwarded"
        );
        Ok(())
    }
}
