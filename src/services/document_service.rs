use serde::Serialize;

use crate::documents::{DocumentDto, DocumentsApi};
use crate::dto::DataTransferObject;
use crate::public_api::gateway::Result;
use crate::user_management::{AccountDto, AccountsApi};

/// A document with its owner attached by a second gateway call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentWithOwner {
    pub document: DocumentDto,
    /// `None` when the referenced account no longer exists
    pub owner: Option<AccountDto>,
}

/// Reads that span accounts and documents. Each side is reached only
/// through its own gateway; nothing here touches a store.
#[derive(Clone)]
pub struct DocumentService {
    accounts: AccountsApi,
    documents: DocumentsApi,
}

impl DocumentService {
    pub fn new(accounts: AccountsApi, documents: DocumentsApi) -> Self {
        Self { accounts, documents }
    }

    pub fn accounts(&self) -> &AccountsApi {
        &self.accounts
    }

    pub fn documents(&self) -> &DocumentsApi {
        &self.documents
    }

    pub async fn document_with_owner(&self, document_id: i64) -> Result<Option<DocumentWithOwner>> {
        let Some(document) = self.documents.find(document_id).await? else {
            return Ok(None);
        };
        let owner = match document.account_id() {
            Some(account_id) => self.accounts.find(account_id).await?,
            None => None,
        };
        if owner.is_none() {
            tracing::warn!("Document {} has no owner account", document_id);
        }
        Ok(Some(DocumentWithOwner { document, owner }))
    }

    /// Documents of the account with `email`; empty when there is no such account
    pub async fn documents_for_owner_email(&self, email: &str) -> Result<Vec<DocumentDto>> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            return Ok(Vec::new());
        };
        match account.id() {
            Some(account_id) => self.documents.for_account(account_id).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{account_attrs, service};
    use serde_json::json;

    #[tokio::test]
    async fn attaches_owner_through_accounts_gateway() {
        let service = service();
        let owner = service.accounts().create_strict(account_attrs("ada@x.com")).await.unwrap();
        let doc = service
            .documents()
            .create_strict(json!({ "title": "Notes", "body": "b", "account_id": owner.id() }))
            .await
            .unwrap();

        let found = service.document_with_owner(doc.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(found.owner, Some(owner));
        assert_eq!(found.document, doc);
        assert!(service.document_with_owner(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn orphaned_document_has_no_owner() {
        let service = service();
        let doc = service
            .documents()
            .create_strict(json!({ "title": "Lost", "account_id": 77 }))
            .await
            .unwrap();
        let found = service.document_with_owner(doc.id().unwrap()).await.unwrap().unwrap();
        assert!(found.owner.is_none());
    }

    #[tokio::test]
    async fn documents_for_owner_email_filters_by_account() {
        let service = service();
        let ada = service.accounts().create_strict(account_attrs("ada@x.com")).await.unwrap();
        let bob = service.accounts().create_strict(account_attrs("bob@x.com")).await.unwrap();
        for (title, owner) in [("a1", &ada), ("b1", &bob), ("a2", &ada)] {
            service
                .documents()
                .create_strict(json!({ "title": title, "account_id": owner.id() }))
                .await
                .unwrap();
        }

        let titles: Vec<String> = service
            .documents_for_owner_email("ada@x.com")
            .await
            .unwrap()
            .iter()
            .filter_map(|d| d.title().map(str::to_string))
            .collect();
        assert_eq!(titles, vec!["a1", "a2"]);
        assert!(service.documents_for_owner_email("nobody@x.com").await.unwrap().is_empty());
    }
}
