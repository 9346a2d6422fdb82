//! Community feed: posts and their comments.
//!
//! Reads work anonymously; when a token is stored it is sent so the server
//! can mark the caller's own posts. Writes need a session.

use std::sync::Arc;

use tracing::info;

use crate::adapter::HttpAdapter;
use crate::error::ApiError;
use crate::types::{require, Comment, CommunityUser, Post, PostDraft, PostUpdate};

pub struct CommunityService {
    adapter: Arc<HttpAdapter>,
}

impl CommunityService {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self { adapter }
    }

    /// The feed, newest first.
    pub async fn list_posts(&self) -> Result<Vec<Post>, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send_optional_auth(client.build_list_posts()).await?;
        let mut posts = client.parse_posts(response)?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Post, ApiError> {
        let client = self.adapter.client();
        let response = self
            .adapter
            .send_optional_auth(client.build_get_post(post_id))
            .await?;
        client.parse_post(response)
    }

    pub async fn create_post(&self, draft: PostDraft) -> Result<Post, ApiError> {
        draft.validate()?;
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_create_post(&draft)?).await?;
        let post = client.parse_post(response)?;
        info!(post_id = post.post_id, "post created");
        Ok(post)
    }

    pub async fn update_post(&self, post_id: i64, update: PostUpdate) -> Result<Post, ApiError> {
        if let Some(title) = &update.title {
            require("title", title)?;
        }
        let client = self.adapter.client();
        let response = self
            .adapter
            .send(client.build_update_post(post_id, &update)?)
            .await?;
        client.parse_post(response)
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<(), ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_delete_post(post_id)).await?;
        client.parse_empty(response)?;
        info!(post_id, "post deleted");
        Ok(())
    }

    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, ApiError> {
        let client = self.adapter.client();
        let response = self
            .adapter
            .send_optional_auth(client.build_list_comments(post_id))
            .await?;
        client.parse_comments(response)
    }

    pub async fn add_comment(&self, post_id: i64, content: &str) -> Result<Comment, ApiError> {
        require("comment", content)?;
        let client = self.adapter.client();
        let response = self
            .adapter
            .send(client.build_add_comment(post_id, content)?)
            .await?;
        client.parse_comment(response)
    }

    pub async fn edit_comment(&self, post_id: i64, comment_id: i64, content: &str) -> Result<Comment, ApiError> {
        require("comment", content)?;
        let client = self.adapter.client();
        let response = self
            .adapter
            .send(client.build_edit_comment(post_id, comment_id, content)?)
            .await?;
        client.parse_comment(response)
    }

    pub async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), ApiError> {
        let client = self.adapter.client();
        let response = self
            .adapter
            .send(client.build_delete_comment(post_id, comment_id))
            .await?;
        client.parse_empty(response)
    }

    /// Who the community service thinks the caller is.
    pub async fn current_user(&self) -> Result<CommunityUser, ApiError> {
        let client = self.adapter.client();
        let response = self.adapter.send(client.build_current_user()).await?;
        client.parse_current_user(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::credentials::CredentialStore;
    use crate::http::{HttpBody, PartContent};
    use crate::storage::MemoryStorage;
    use crate::testing::ScriptedTransport;
    use crate::types::{ImageUpload, UserProfile};

    async fn service(signed_in: bool) -> (CommunityService, Arc<ScriptedTransport>) {
        let credentials = Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())));
        if signed_in {
            credentials.save("tok", &UserProfile::default()).await.unwrap();
        }
        let transport = Arc::new(ScriptedTransport::new());
        let adapter = HttpAdapter::new(ClientConfig::default(), transport.clone(), credentials);
        (CommunityService::new(Arc::new(adapter)), transport)
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_anonymous() {
        let (service, transport) = service(false).await;
        transport.push_value(
            200,
            &json!([
                {"postId": 1, "title": "old", "createdAt": "2025-01-01T10:00:00Z"},
                {"postId": 2, "title": "new", "createdAt": "2025-02-01T10:00:00Z"}
            ]),
        );
        let posts = service.list_posts().await.unwrap();
        assert_eq!(posts[0].post_id, 2);
        assert_eq!(transport.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn create_post_sends_multipart_with_json_tags() {
        let (service, transport) = service(true).await;
        transport.push_value(201, &json!({"id": 9, "title": "Walkies"}));
        let post = service
            .create_post(PostDraft {
                title: "Walkies".to_string(),
                category: "dogs".to_string(),
                content: "Park at 6".to_string(),
                tags: vec!["park".to_string(), "dog".to_string()],
                image: Some(ImageUpload::from_file_name("park.jpg", vec![0xff])),
            })
            .await
            .unwrap();
        assert_eq!(post.post_id, 9);

        let sent = &transport.requests()[0];
        let Some(HttpBody::Multipart(parts)) = &sent.body else {
            panic!("expected multipart body");
        };
        let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "category", "content", "tags", "file"]);
        assert_eq!(parts[3].content, PartContent::Text(r#"["park","dog"]"#.to_string()));
    }

    #[tokio::test]
    async fn writes_need_a_session() {
        let (service, transport) = service(false).await;
        assert_eq!(service.delete_post(1).await.unwrap_err(), ApiError::AuthRequired);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let (service, transport) = service(true).await;
        let err = service.add_comment(1, " ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn comment_round_trip() {
        let (service, transport) = service(true).await;
        transport.push_value(201, &json!({"id": 4, "comment": "cute!"}));
        transport.push_value(200, &json!({"id": 4, "comment": "very cute!"}));
        transport.push_json(204, "");

        let added = service.add_comment(1, "cute!").await.unwrap();
        let edited = service.edit_comment(1, added.id, "very cute!").await.unwrap();
        service.delete_comment(1, edited.id).await.unwrap();

        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec!["/community/1/comments", "/community/1/comments/4", "/community/1/comments/4"]
        );
    }
}
