//! Object names still referenced by workspace records.

use anyhow::{Context, Result};
use common::hierarchy::{ClassRef, classes};
use common::model::{AttachmentAttrs, ContactAttrs};
use common::storage::{StoredObject, WorkspaceBlobs};
use common::transactor::DocumentClient;
use common::workspace::WorkspaceId;
use object_store::path::Path as ObjectPath;
use std::collections::HashSet;

/// Collect every object name a record points at.
///
/// The set is the `file` of every attachment plus every non-empty contact
/// `avatar`. Contacts include all derived classes (persons, employees,
/// organizations).
pub async fn collect_referenced_files(client: &dyn DocumentClient) -> Result<HashSet<String>> {
    let attachments = client
        .find_all(&ClassRef::new(classes::ATTACHMENT))
        .await
        .context("Failed to enumerate attachments")?;
    let contacts = client
        .find_all(&ClassRef::new(classes::CONTACT))
        .await
        .context("Failed to enumerate contacts")?;

    let mut referenced = HashSet::with_capacity(attachments.len() + contacts.len());

    for attachment in &attachments {
        match attachment.attrs::<AttachmentAttrs>() {
            Ok(attrs) => {
                referenced.insert(attrs.file);
            }
            Err(e) => tracing::warn!(
                id = %attachment.id,
                error = %e,
                "Skipping attachment without a file reference"
            ),
        }
    }

    for contact in &contacts {
        match contact.attrs::<ContactAttrs>() {
            Ok(ContactAttrs {
                avatar: Some(avatar),
                ..
            }) if !avatar.is_empty() => {
                referenced.insert(avatar);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(
                id = %contact.id,
                error = %e,
                "Skipping malformed contact"
            ),
        }
    }

    tracing::debug!(
        workspace = %client.workspace(),
        attachments = attachments.len(),
        contacts = contacts.len(),
        referenced = referenced.len(),
        "Collected referenced object names"
    );

    Ok(referenced)
}

/// Objects of `workspace` that no referenced name resolves to, in listing
/// order.
///
/// Referenced names are raw; they are matched against listed locations after
/// the same path encoding the store applies on write.
pub fn select_orphans(
    workspace: &WorkspaceId,
    objects: Vec<StoredObject>,
    referenced: &HashSet<String>,
) -> Vec<StoredObject> {
    let live: HashSet<ObjectPath> = referenced
        .iter()
        .map(|name| WorkspaceBlobs::path(workspace, name))
        .collect();
    objects
        .into_iter()
        .filter(|object| !live.contains(&object.location))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockClient;
    use common::model::Document;

    fn ws() -> WorkspaceId {
        WorkspaceId::new("ws").unwrap()
    }

    fn object(name: &str) -> StoredObject {
        let location = WorkspaceBlobs::path(&ws(), name);
        StoredObject {
            name: location.as_ref().trim_start_matches("ws/").to_string(),
            location,
            size_bytes: 1,
            last_modified: Default::default(),
        }
    }

    fn contact(class: &str, name: &str, avatar: Option<&str>) -> Document {
        Document::contact(
            class,
            &ContactAttrs {
                name: name.to_string(),
                avatar: avatar.map(str::to_string),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_attachments_and_avatars_are_referenced() {
        let client = MockClient::new(vec![
            Document::attachment(&AttachmentAttrs {
                file: "a.png".to_string(),
                name: "a".to_string(),
            })
            .unwrap(),
            contact(classes::PERSON, "Ada", Some("b.png")),
            contact(classes::EMPLOYEE, "Grace", Some("e.png")),
            contact(classes::ORGANIZATION, "Acme", Some("")),
            contact(classes::PERSON, "Nobody", None),
        ]);

        let referenced = collect_referenced_files(&client).await.unwrap();

        let mut names: Vec<_> = referenced.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.png", "e.png"]);
    }

    #[tokio::test]
    async fn test_issues_do_not_reference_objects() {
        let mut issue = Document::new(classes::ISSUE, &serde_json::json!({"title": "t"})).unwrap();
        issue
            .attributes
            .insert("file".to_string(), serde_json::json!("x.png"));
        let client = MockClient::new(vec![issue]);

        assert!(collect_referenced_files(&client).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_without_file_is_skipped() {
        let broken =
            Document::new(classes::ATTACHMENT, &serde_json::json!({"name": "lost"})).unwrap();
        let client = MockClient::new(vec![
            broken,
            Document::attachment(&AttachmentAttrs {
                file: "kept.png".to_string(),
                name: String::new(),
            })
            .unwrap(),
        ]);

        let referenced = collect_referenced_files(&client).await.unwrap();
        assert_eq!(referenced.len(), 1);
        assert!(referenced.contains("kept.png"));
    }

    #[test]
    fn test_select_orphans() {
        let referenced: HashSet<String> = ["a.png", "b.png"].iter().map(|s| s.to_string()).collect();
        let orphans = select_orphans(
            &ws(),
            vec![object("a.png"), object("b.png"), object("c.png")],
            &referenced,
        );
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].name, "c.png");
    }

    #[test]
    fn test_select_orphans_matches_encoded_locations() {
        let referenced: HashSet<String> = ["report#1.pdf", "100%.png", "{logo}.svg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let orphans = select_orphans(
            &ws(),
            vec![
                object("report#1.pdf"),
                object("100%.png"),
                object("{logo}.svg"),
                object("junk#1.bin"),
            ],
            &referenced,
        );
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].location, WorkspaceBlobs::path(&ws(), "junk#1.bin"));
    }
}
