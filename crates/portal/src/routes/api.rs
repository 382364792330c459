//! Portal API handlers: identity, roles, front-end configuration and forms.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use submissions_hub_core::{AccessReason, Role};

use super::{lenient_object, string_field};
use crate::config::PortalLinks;
use crate::error::AppError;
use crate::middleware::{OptionalUser, RequireUser};
use crate::state::AppState;

// =============================================================================
// Identity
// =============================================================================

/// Response for `GET /api/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Signed-in email and role, or nulls when nobody is signed in.
///
/// The role is recomputed from the access policy on every call.
pub async fn me(State(state): State<AppState>, OptionalUser(user): OptionalUser) -> Json<MeResponse> {
    let response = match user {
        Some(user) => MeResponse {
            role: Some(state.access().role_of(&user.email)),
            email: Some(user.email.into_inner()),
        },
        None => MeResponse {
            email: None,
            role: None,
        },
    };
    Json(response)
}

/// Gate decision for the signed-in user.
pub async fn check_domain(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
) -> Json<serde_json::Value> {
    let Some(user) = user else {
        return Json(json!({ "authorized": false, "reason": "no_user" }));
    };

    let decision = state.access().authorize_email(&user.email);
    Json(json!({ "authorized": decision.allowed, "reason": decision.reason }))
}

/// Role lookup for an arbitrary email.
pub async fn role(State(state): State<AppState>, body: Bytes) -> Response {
    let email = string_field(&lenient_object(&body), "email").unwrap_or_default();
    let decision = state.access().authorize(&email);

    match decision.reason {
        AccessReason::Invalid => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "reason": "invalid" })),
        )
            .into_response(),
        AccessReason::Unauthorized => (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "reason": "unauthorized" })),
        )
            .into_response(),
        AccessReason::Admin | AccessReason::Domain => {
            Json(json!({ "ok": true, "role": decision.role })).into_response()
        }
    }
}

// =============================================================================
// Front-end Configuration
// =============================================================================

/// External destinations shown on the portal home page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUrls<'a> {
    pub meeting_upload: &'a str,
    pub article_upload: &'a str,
    pub ai_exchange_upload: &'a str,
    pub admin_base: &'a str,
    pub documents_upload: &'a str,
    pub eleven_labs: &'a str,
    pub news: &'a str,
}

/// Feature flags for the portal home page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFeatures<'a> {
    pub show_big_news_banner: bool,
    pub big_news_badge: &'a str,
}

/// Response for `GET /api/config`.
#[derive(Debug, Serialize)]
pub struct ConfigResponse<'a> {
    pub urls: ConfigUrls<'a>,
    pub features: ConfigFeatures<'a>,
}

impl<'a> From<&'a PortalLinks> for ConfigResponse<'a> {
    fn from(links: &'a PortalLinks) -> Self {
        Self {
            urls: ConfigUrls {
                meeting_upload: &links.meeting_upload,
                article_upload: &links.article_upload,
                ai_exchange_upload: &links.ai_exchange_upload,
                admin_base: &links.admin_base,
                documents_upload: &links.documents_upload,
                eleven_labs: &links.eleven_labs,
                news: &links.news,
            },
            features: ConfigFeatures {
                show_big_news_banner: links.show_big_news_banner,
                big_news_badge: &links.big_news_badge,
            },
        }
    }
}

/// Front-end destinations and feature flags.
pub async fn config(State(state): State<AppState>, RequireUser(_user): RequireUser) -> Response {
    Json(ConfigResponse::from(&state.config().links)).into_response()
}

// =============================================================================
// Forms
// =============================================================================

/// Embeddable upload form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub embed_url: String,
}

/// Look up a form by slug. Returns `None` for unknown slugs.
fn find_form(links: &PortalLinks, slug: &str) -> Option<FormDescriptor> {
    let (slug, title, description, embed_url) = match slug {
        "report-upload" => (
            "report-upload",
            "Report Upload",
            "Upload a meeting or event report.",
            &links.report_upload_embed,
        ),
        "article-upload" => (
            "article-upload",
            "Article Upload",
            "Submit an article for review.",
            &links.article_upload_embed,
        ),
        _ => return None,
    };

    Some(FormDescriptor {
        slug,
        title,
        description,
        embed_url: embed_url.clone(),
    })
}

/// Form embed descriptor for a known slug.
pub async fn form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FormDescriptor>, AppError> {
    let form = find_form(&state.config().links, &slug)
        .ok_or_else(|| AppError::NotFound(format!("form '{slug}'")))?;

    if form.embed_url.is_empty() {
        return Err(AppError::NotConfigured(format!("form '{slug}'")));
    }

    Ok(Json(form))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn links() -> PortalLinks {
        PortalLinks {
            meeting_upload: "https://forms.example/meeting".into(),
            report_upload_embed: "https://embed.example/report".into(),
            show_big_news_banner: true,
            big_news_badge: "New".into(),
            ..PortalLinks::default()
        }
    }

    #[test]
    fn test_config_response_shape() {
        let links = links();
        let value = serde_json::to_value(ConfigResponse::from(&links)).unwrap();
        assert_eq!(value["urls"]["meetingUpload"], "https://forms.example/meeting");
        assert_eq!(value["urls"]["elevenLabs"], "");
        assert_eq!(value["features"]["showBigNewsBanner"], true);
        assert_eq!(value["features"]["bigNewsBadge"], "New");
    }

    #[test]
    fn test_find_form() {
        let links = links();
        let report = find_form(&links, "report-upload").unwrap();
        assert_eq!(report.embed_url, "https://embed.example/report");

        let article = find_form(&links, "article-upload").unwrap();
        assert!(article.embed_url.is_empty());

        assert!(find_form(&links, "nope").is_none());
    }

    #[test]
    fn test_form_descriptor_serializes_camel_case() {
        let value = serde_json::to_value(find_form(&links(), "report-upload").unwrap()).unwrap();
        assert_eq!(value["slug"], "report-upload");
        assert!(value.get("embedUrl").is_some());
    }
}
