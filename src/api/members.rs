//! Member endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{CreateMember, Member, PageQuery, UpdateMember},
};

use super::{MemberPage, PaginatedResponse};

/// List members ordered by id
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of members", body = MemberPage)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Member>>> {
    let (members, total) = state.services.catalogue.list_members(&page).await?;

    Ok(Json(PaginatedResponse {
        items: members,
        total,
        page: page.page(),
        per_page: page.per_page(),
    }))
}

#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.catalogue.get_member(id).await?;
    Ok(Json(member))
}

#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let member = state.services.catalogue.create_member(data).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    patch,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    let member = state.services.catalogue.update_member(id, patch).await?;
    Ok(Json(member))
}

/// Delete a member with no open borrowings
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Member has open borrowings", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalogue.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
