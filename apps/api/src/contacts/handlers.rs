use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::contacts::referrals::{
    delete_referral, get_referral, insert_referral, list_referrals, update_referral,
    ReferralFilter,
};
use crate::contacts::store::{
    archive_contact, contact_exists, count_contacts, create_contact, get_contact, list_contacts,
    update_contact, ContactChanges, ContactFilter, NewContact,
};
use crate::errors::AppError;
use crate::jobs::store::{job_exists, touch_job};
use crate::models::contact::{ContactRow, ContactStrength, ReferralRow, ReferralStatus};
use crate::models::outreach::OutreachRow;
use crate::outreach::store::recent_for_contact;
use crate::pagination::{PageParams, Paginated};
use crate::state::AppState;
use crate::validation::{
    non_blank, normalize_tags, validate_email_or_empty, validate_not_blank, validate_url_or_empty,
    ValidatedJson, ValidatedPath, ValidatedQuery,
};

/// Outreach rows shown on the contact detail page.
const RECENT_OUTREACH: i64 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub linkedin_url: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub strength: Option<ContactStrength>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

/// An empty string clears an optional field.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactRequest {
    #[validate(
        length(min = 1, max = 200, message = "must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_email_or_empty"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_url_or_empty"))]
    pub linkedin_url: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub strength: Option<ContactStrength>,
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactDetail {
    #[serde(flatten)]
    pub contact: ContactRow,
    pub recent_outreach: Vec<OutreachRow>,
    pub referrals: Vec<ReferralRow>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReferralRequest {
    pub contact_id: Uuid,
    pub job_id: Uuid,
    pub status: Option<ReferralStatus>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReferralRequest {
    pub status: Option<ReferralStatus>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// GET /api/v1/contacts
pub async fn handle_list_contacts(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageParams>,
    ValidatedQuery(filter): ValidatedQuery<ContactFilter>,
) -> Result<Json<Paginated<ContactRow>>, AppError> {
    let total = count_contacts(&state.db, user.user_id, &filter).await?;
    let items = list_contacts(&state.db, user.user_id, &filter, &page).await?;
    Ok(Json(Paginated::new(items, total, &page)))
}

/// POST /api/v1/contacts
pub async fn handle_create_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactRow>), AppError> {
    let company = non_blank(req.company);
    let title = non_blank(req.title);
    let email = non_blank(req.email).map(|e| e.to_lowercase());
    let linkedin_url = non_blank(req.linkedin_url);
    let phone = non_blank(req.phone);
    let notes = non_blank(req.notes);
    let tags = normalize_tags(&req.tags);

    let contact = create_contact(
        &state.db,
        NewContact {
            user_id: user.user_id,
            name: req.name.trim(),
            company: company.as_deref(),
            title: title.as_deref(),
            email: email.as_deref(),
            linkedin_url: linkedin_url.as_deref(),
            phone: phone.as_deref(),
            strength: req.strength.unwrap_or(ContactStrength::Weak),
            tags: &tags,
            notes: notes.as_deref(),
        },
    )
    .await?;

    info!(contact_id = %contact.id, user_id = %user.user_id, "Contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/contacts/:id
pub async fn handle_get_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<ContactDetail>, AppError> {
    let contact = get_contact(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Contact", id))?;
    let recent_outreach = recent_for_contact(&state.db, contact.id, RECENT_OUTREACH).await?;
    let referrals = list_referrals(
        &state.db,
        user.user_id,
        &ReferralFilter {
            contact_id: Some(contact.id),
            job_id: None,
        },
    )
    .await?;

    Ok(Json(ContactDetail {
        contact,
        recent_outreach,
        referrals,
    }))
}

/// PATCH /api/v1/contacts/:id
pub async fn handle_update_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateContactRequest>,
) -> Result<Json<ContactRow>, AppError> {
    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string());
    let changes = ContactChanges {
        name: trimmed(req.name),
        company: trimmed(req.company),
        title: trimmed(req.title),
        email: trimmed(req.email).map(|e| e.to_lowercase()),
        linkedin_url: trimmed(req.linkedin_url),
        phone: trimmed(req.phone),
        notes: trimmed(req.notes),
        strength: req.strength,
        tags: req.tags.as_deref().map(normalize_tags),
    };

    let contact = update_contact(&state.db, user.user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Contact", id))?;
    info!(contact_id = %contact.id, "Contact updated");
    Ok(Json(contact))
}

/// DELETE /api/v1/contacts/:id
pub async fn handle_delete_contact(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !archive_contact(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Contact", id));
    }
    info!(contact_id = %id, "Contact archived");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/referrals
pub async fn handle_list_referrals(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedQuery(filter): ValidatedQuery<ReferralFilter>,
) -> Result<Json<Vec<ReferralRow>>, AppError> {
    Ok(Json(list_referrals(&state.db, user.user_id, &filter).await?))
}

/// POST /api/v1/referrals
pub async fn handle_create_referral(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateReferralRequest>,
) -> Result<(StatusCode, Json<ReferralRow>), AppError> {
    if !contact_exists(&state.db, user.user_id, req.contact_id).await? {
        return Err(AppError::not_found("Contact", req.contact_id));
    }
    if !job_exists(&state.db, user.user_id, req.job_id).await? {
        return Err(AppError::not_found("Job", req.job_id));
    }
    let note = non_blank(req.note);

    let mut tx = state.db.begin().await?;
    let referral = insert_referral(
        &mut tx,
        user.user_id,
        req.contact_id,
        req.job_id,
        req.status.unwrap_or(ReferralStatus::Requested),
        note.as_deref(),
    )
    .await?;
    touch_job(&mut tx, referral.job_id, Utc::now()).await?;
    tx.commit().await?;

    info!(referral_id = %referral.id, job_id = %referral.job_id, "Referral created");
    Ok((StatusCode::CREATED, Json(referral)))
}

/// PATCH /api/v1/referrals/:id
pub async fn handle_update_referral(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateReferralRequest>,
) -> Result<Json<ReferralRow>, AppError> {
    let note = req.note.map(|n| n.trim().to_string());

    let mut tx = state.db.begin().await?;
    let existing = get_referral(&mut tx, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Referral", id))?;
    let referral = update_referral(&mut tx, existing.id, req.status, note.as_deref()).await?;
    touch_job(&mut tx, referral.job_id, Utc::now()).await?;
    tx.commit().await?;

    info!(referral_id = %id, status = %referral.status, "Referral updated");
    Ok(Json(referral))
}

/// DELETE /api/v1/referrals/:id
pub async fn handle_delete_referral(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !delete_referral(&state.db, user.user_id, id).await? {
        return Err(AppError::not_found("Referral", id));
    }
    info!(referral_id = %id, "Referral deleted");
    Ok(StatusCode::NO_CONTENT)
}
