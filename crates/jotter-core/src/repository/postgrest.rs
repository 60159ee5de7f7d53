//! Supabase PostgREST implementation of [`NoteRepository`].

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;

use super::NoteRepository;
use crate::auth::{describe_error, AuthSession};
use crate::error::{Error, Result};
use crate::models::{Note, NoteDraft, NoteId};
use crate::util::is_http_url;

const NOTES_TABLE: &str = "notes";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Clone)]
pub struct PostgrestNoteRepository {
    table_url: String,
    anon_key: String,
    client: Client,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct UpdateRow<'a> {
    title: &'a str,
    content: &'a str,
    updated_at: DateTime<Utc>,
}

impl PostgrestNoteRepository {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> Result<Self> {
        let table_url = normalize_table_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::Validation(
                "Supabase anon key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            table_url,
            anon_key,
            client: Client::builder().build()?,
        })
    }

    fn authorized(&self, request: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
    }

    fn id_filter(id: NoteId) -> [(&'static str, String); 1] {
        [("id", format!("eq.{id}"))]
    }

    async fn check(response: Response, id: Option<NoteId>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body, id))
    }

    async fn single_from_representation(response: Response, id: Option<NoteId>) -> Result<Note> {
        first_row(response.json::<Vec<Note>>().await?, id)
    }
}

/// Map a non-success PostgREST status to the error taxonomy.
fn error_for_status(status: StatusCode, body: &str, id: Option<NoteId>) -> Error {
    let message = describe_error(status, body);
    tracing::debug!("PostgREST request failed: {}", message);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        // 406 is PGRST116: a single-object request matched no row.
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => {
            Error::NotFound(id.map_or(message, |id| id.to_string()))
        }
        _ => Error::Remote(message),
    }
}

/// First row of a `return=representation` body; an empty body means no row
/// matched.
fn first_row(rows: Vec<Note>, id: Option<NoteId>) -> Result<Note> {
    rows.into_iter().next().ok_or_else(|| {
        Error::NotFound(id.map_or_else(|| "inserted row".to_string(), |id| id.to_string()))
    })
}

impl NoteRepository for PostgrestNoteRepository {
    async fn list_recent(&self, session: &AuthSession) -> Result<Vec<Note>> {
        let request = self.authorized(
            self.client
                .get(&self.table_url)
                .query(&[("select", "*"), ("order", "updated_at.desc.nullslast")]),
            session,
        );
        let response = Self::check(request.send().await?, None).await?;
        let mut notes = response.json::<Vec<Note>>().await?;
        // Rows without updated_at fall back to created_at for recency.
        notes.sort_by_key(|note| std::cmp::Reverse(note.recency()));
        Ok(notes)
    }

    async fn get(&self, session: &AuthSession, id: NoteId) -> Result<Note> {
        let request = self.authorized(
            self.client
                .get(&self.table_url)
                .query(&[("select", "*")])
                .query(&Self::id_filter(id))
                .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT)),
            session,
        );
        let response = Self::check(request.send().await?, Some(id)).await?;
        Ok(response.json::<Note>().await?)
    }

    async fn insert(&self, session: &AuthSession, draft: &NoteDraft) -> Result<Note> {
        let request = self.authorized(
            self.client
                .post(&self.table_url)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&InsertRow {
                    title: &draft.title,
                    content: &draft.content,
                }),
            session,
        );
        let response = Self::check(request.send().await?, None).await?;
        Self::single_from_representation(response, None).await
    }

    async fn update(
        &self,
        session: &AuthSession,
        id: NoteId,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        let request = self.authorized(
            self.client
                .patch(&self.table_url)
                .query(&Self::id_filter(id))
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&UpdateRow {
                    title: &draft.title,
                    content: &draft.content,
                    updated_at,
                }),
            session,
        );
        let response = Self::check(request.send().await?, Some(id)).await?;
        Self::single_from_representation(response, Some(id)).await
    }

    async fn delete(&self, session: &AuthSession, id: NoteId) -> Result<()> {
        let request = self.authorized(
            self.client
                .delete(&self.table_url)
                .query(&Self::id_filter(id))
                .header("Prefer", RETURN_REPRESENTATION),
            session,
        );
        let response = Self::check(request.send().await?, Some(id)).await?;
        Self::single_from_representation(response, Some(id))
            .await
            .map(|_| ())
    }
}

/// Build the `notes` table endpoint from a project URL.
pub fn normalize_table_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !is_http_url(trimmed) {
        return Err(Error::Validation(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    let base = trimmed.strip_suffix("/rest/v1").unwrap_or(trimmed);
    Ok(format!("{base}/rest/v1/{NOTES_TABLE}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_is_derived_from_project_url() {
        assert_eq!(
            normalize_table_url("https://demo.supabase.co/").unwrap(),
            "https://demo.supabase.co/rest/v1/notes"
        );
        assert_eq!(
            normalize_table_url("https://demo.supabase.co/rest/v1").unwrap(),
            "https://demo.supabase.co/rest/v1/notes"
        );
        assert!(normalize_table_url("demo.supabase.co").is_err());
    }

    #[test]
    fn update_row_serializes_timestamp() {
        let row = UpdateRow {
            title: "T",
            content: "",
            updated_at: "2025-01-02T03:04:05Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["updated_at"], "2025-01-02T03:04:05Z");
    }

    fn note_id() -> NoteId {
        "5f8e2c1a-3b4d-4e6f-8a9b-0c1d2e3f4a5b".parse().unwrap()
    }

    #[test]
    fn auth_statuses_map_to_permission_denied() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let error = error_for_status(status, r#"{"message":"JWT expired"}"#, None);
            let expected = format!("JWT expired ({})", status.as_u16());
            assert!(matches!(error, Error::PermissionDenied(ref message) if *message == expected));
        }
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let id = note_id();
        let body = r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#;

        let error = error_for_status(StatusCode::NOT_ACCEPTABLE, body, Some(id));
        assert!(matches!(error, Error::NotFound(ref message) if message == &id.to_string()));

        let error = error_for_status(StatusCode::NOT_FOUND, "", None);
        assert!(matches!(error, Error::NotFound(ref message) if message == "HTTP 404"));
    }

    #[test]
    fn other_statuses_map_to_remote() {
        let error = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "boom", Some(note_id()));
        assert!(matches!(error, Error::Remote(ref message) if message == "boom (500)"));

        let error = error_for_status(StatusCode::CONFLICT, r#"{"message":"duplicate key"}"#, None);
        assert!(matches!(error, Error::Remote(ref message) if message == "duplicate key (409)"));
    }

    #[test]
    fn empty_representation_is_not_found() {
        let id = note_id();
        let error = first_row(Vec::new(), Some(id)).unwrap_err();
        assert!(matches!(error, Error::NotFound(ref message) if message == &id.to_string()));
        assert!(first_row(Vec::new(), None).unwrap_err().is_not_found());
    }

    #[test]
    fn empty_anon_key_is_rejected() {
        assert!(PostgrestNoteRepository::new("https://demo.supabase.co", "  ").is_err());
    }
}
