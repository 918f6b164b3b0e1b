use crate::domain::{self, Member, commands::*};
use crate::ports::{ChangeSet, EntityKey};

use super::dependencies::ServiceDependencies;
use super::errors::{LibraryApplicationError, Result};

/// 会員を登録する
pub async fn create_member(deps: &ServiceDependencies, cmd: RegisterMember) -> Result<Member> {
    let member = domain::register_member(&cmd.name, &cmd.email, cmd.joined_at)?;

    deps.store
        .commit(ChangeSet::new().save_member(member.clone()))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(member_id = %member.member_id.value(), name = %member.name, "member registered");
    Ok(member)
}

/// 会員を削除する
///
/// ビジネスルール：
/// - 未返却の貸出がある会員は削除できない
/// - 返却済みの貸出は会員IDを保持したまま残る
///
/// 確認の後に貸出が確定した場合は、ストアのcommitが削除を拒否する。
pub async fn delete_member(deps: &ServiceDependencies, cmd: DeleteMember) -> Result<()> {
    deps.store
        .get_member(cmd.member_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::MemberNotFound)?;

    let loans = deps
        .store
        .find_loans_by_member(cmd.member_id)
        .await
        .map_err(LibraryApplicationError::Storage)?;

    if loans.iter().any(|loan| loan.is_open()) {
        tracing::warn!(member_id = %cmd.member_id.value(), "refusing to delete member with open loans");
        return Err(LibraryApplicationError::MemberHasOpenLoans);
    }

    deps.store
        .commit(ChangeSet::new().delete(EntityKey::Member(cmd.member_id)))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(member_id = %cmd.member_id.value(), "member deleted");
    Ok(())
}
