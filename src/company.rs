//! Workspace (company) membership and onboarding.
//!
//! A company owns its member and pending-request lists; the owner is always
//! a member. Joining goes through request/approve: `request_join` parks the
//! uid in `pendingRequests` and on the profile's `pendingCompanyId`,
//! approval promotes both.

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Company, Role, UserProfile, COMPANIES, USERS};
use crate::session::CurrentUser;
use crate::store::{self, MemoryStore};

#[derive(Clone)]
pub struct CompanyRepository {
    store: MemoryStore,
    config: Config,
}

impl CompanyRepository {
    pub fn new(store: MemoryStore, config: Config) -> Self {
        Self { store, config }
    }

    /// Create a workspace with the actor as owner, sole member, and admin.
    /// Returns the company id, which doubles as the invite code.
    pub async fn create_company(&self, name: &str, actor: &CurrentUser) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "company name cannot be empty".to_string(),
            ));
        }

        let payload = json!({
            "name": name,
            "ownerId": actor.uid,
            "members": [actor.uid],
            "pendingRequests": [],
            "createdAt": MemoryStore::server_timestamp(),
        });
        let company_id = store::with_retry(&self.config.retry, || {
            self.store.create(COMPANIES, payload.clone())
        })
        .await?;

        self.write_profile(actor, Role::Admin, Some(&company_id), None)
            .await?;
        Ok(company_id)
    }

    /// Ask to join a workspace by invite code. The company must exist; a
    /// bad code is the one user-facing not-found in the join flow.
    pub async fn request_join(&self, company_id: &str, actor: &CurrentUser) -> Result<()> {
        if self.store.get(COMPANIES, company_id).await?.is_none() {
            return Err(Error::CompanyNotFound(company_id.to_string()));
        }

        store::with_retry(&self.config.retry, || {
            self.store.update(
                COMPANIES,
                company_id,
                json!({
                    "pendingRequests": MemoryStore::array_union(vec![json!(actor.uid)]),
                }),
            )
        })
        .await?;

        self.write_profile(actor, Role::Employee, None, Some(company_id))
            .await
    }

    /// Accept a pending request: move the uid into the member list and
    /// promote the profile's pending workspace to current.
    pub async fn approve_request(&self, company_id: &str, uid: &str) -> Result<()> {
        store::with_retry(&self.config.retry, || {
            self.store.update(
                COMPANIES,
                company_id,
                json!({
                    "pendingRequests": MemoryStore::array_remove(vec![json!(uid)]),
                    "members": MemoryStore::array_union(vec![json!(uid)]),
                }),
            )
        })
        .await?;

        self.patch_profile(
            uid,
            json!({
                "currentCompanyId": company_id,
                "pendingCompanyId": Value::Null,
            }),
        )
        .await
    }

    /// Reject a pending request and clear the requester's pending state.
    pub async fn reject_request(&self, company_id: &str, uid: &str) -> Result<()> {
        store::with_retry(&self.config.retry, || {
            self.store.update(
                COMPANIES,
                company_id,
                json!({
                    "pendingRequests": MemoryStore::array_remove(vec![json!(uid)]),
                }),
            )
        })
        .await?;

        self.patch_profile(uid, json!({ "pendingCompanyId": Value::Null }))
            .await
    }

    pub async fn company(&self, company_id: &str) -> Result<Option<Company>> {
        match self.store.get(COMPANIES, company_id).await? {
            Some(doc) => Ok(Some(Company::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.store.get(USERS, uid).await? {
            Some(doc) => Ok(Some(UserProfile::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// The workspace id all scoped queries must use for this user.
    ///
    /// A missing profile or an unassigned workspace both mean onboarding
    /// has not completed.
    pub async fn current_company_id(&self, uid: &str) -> Result<String> {
        let profile = self
            .profile(uid)
            .await?
            .ok_or_else(|| Error::ProfileIncomplete(uid.to_string()))?;
        profile
            .current_company_id
            .ok_or_else(|| Error::ProfileIncomplete(uid.to_string()))
    }

    /// Profiles of the company's active members. Missing profiles are
    /// skipped silently.
    pub async fn members(&self, company_id: &str) -> Result<Vec<UserProfile>> {
        let company = self
            .company(company_id)
            .await?
            .ok_or_else(|| Error::CompanyNotFound(company_id.to_string()))?;
        self.profiles_for(&company.members).await
    }

    /// Profiles of users waiting for approval. Missing profiles are
    /// skipped silently.
    pub async fn pending_requests(&self, company_id: &str) -> Result<Vec<UserProfile>> {
        let company = self
            .company(company_id)
            .await?
            .ok_or_else(|| Error::CompanyNotFound(company_id.to_string()))?;
        self.profiles_for(&company.pending_requests).await
    }

    async fn profiles_for(&self, uids: &[String]) -> Result<Vec<UserProfile>> {
        let mut profiles = Vec::with_capacity(uids.len());
        for uid in uids {
            match self.profile(uid).await {
                Ok(Some(profile)) => profiles.push(profile),
                Ok(None) => {}
                Err(err) if err.class() == crate::error::ErrorClass::Invalid => {
                    tracing::warn!(uid, error = %err, "skipping malformed user profile");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(profiles)
    }

    async fn write_profile(
        &self,
        user: &CurrentUser,
        role: Role,
        current_company_id: Option<&str>,
        pending_company_id: Option<&str>,
    ) -> Result<()> {
        let payload = json!({
            "uid": user.uid,
            "email": user.email,
            "displayName": user.display_name,
            "photoURL": user.photo_url,
            "role": role,
            "currentCompanyId": current_company_id,
            "pendingCompanyId": pending_company_id,
            "createdAt": MemoryStore::server_timestamp(),
        });
        store::with_retry(&self.config.retry, || {
            self.store.set(USERS, &user.uid, payload.clone())
        })
        .await
    }

    async fn patch_profile(&self, uid: &str, fields: Value) -> Result<()> {
        match self.store.update(USERS, uid, fields).await {
            Ok(()) => Ok(()),
            // A request can outlive its requester's profile; membership
            // state on the company is already settled at this point.
            Err(Error::DocumentNotFound { .. }) => {
                tracing::debug!(uid, "profile missing while settling request");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
