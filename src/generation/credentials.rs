use crate::catalog::CredentialRefresher;
use crate::errors::GenerationError;
use crate::models::{Member, MemberCredentials, Role};
use crate::store::EventStore;
use futures_util::future::{join, join_all};

/// Refresh every member's credential concurrently.
///
/// The owner's refresh must succeed. Other members soft-fail into an empty
/// slot and drop out of the stages that need their identity. Returns the
/// owner together with the credentials, owner first.
pub async fn refresh_members(
    event_id: &str,
    members: &[Member],
    refresher: &dyn CredentialRefresher,
    store: &dyn EventStore,
) -> Result<(Member, MemberCredentials), GenerationError> {
    let mut owners = members.iter().filter(|m| m.role == Role::Owner);
    let owner = owners
        .next()
        .ok_or_else(|| GenerationError::OwnerNotFound(event_id.to_string()))?;
    if owners.next().is_some() {
        log::warn!("Event {} has more than one owner, using {}", event_id, owner.user_id);
    }

    let others: Vec<&Member> = members
        .iter()
        .filter(|m| m.user_id != owner.user_id)
        .collect();

    let (owner_result, other_results) = join(
        refresher.refresh(owner),
        join_all(others.iter().map(|m| refresher.refresh(m))),
    )
    .await;

    let owner_token =
        owner_result.map_err(|e| GenerationError::OwnerCredential(e.to_string()))?;
    store.save_access_token(&owner.user_id, &owner_token).await?;

    let mut slots = Vec::with_capacity(others.len());
    for (member, result) in others.iter().zip(other_results) {
        match result {
            Ok(token) => {
                store.save_access_token(&member.user_id, &token).await?;
                slots.push(Some(token));
            }
            Err(e) => {
                log::warn!(
                    "Credential refresh failed for {}, excluding them from this run: {}",
                    member.user_id,
                    e
                );
                slots.push(None);
            }
        }
    }

    let credentials = MemberCredentials::new(owner_token, slots);
    log::info!(
        "Refreshed {}/{} member credentials for event {}",
        credentials.valid_count(),
        credentials.member_count(),
        event_id
    );
    Ok((owner.clone(), credentials))
}
