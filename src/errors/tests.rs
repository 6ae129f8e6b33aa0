use super::*;
use axum::body::to_bytes;
use axum::response::IntoResponse;

/// Helper to extract status code and body JSON from an ApiError response
async fn error_response(error: ApiError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_database_error_response_hides_details() {
    let error = ApiError::Database(anyhow::anyhow!("disk I/O error"));
    let (status, body) = error_response(error).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_card_not_found_maps_to_404() {
    let error: ApiError = SchedError::CardNotFound(42).into();
    let (status, body) = error_response(error).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Card not found: 42");
}

#[tokio::test]
async fn test_deck_not_found_maps_to_404() {
    let error: ApiError = SchedError::DeckNotFound(7).into();
    let (status, _) = error_response(error).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_grade_maps_to_400() {
    let error: ApiError = SchedError::InvalidGrade(9).into();
    let (status, body) = error_response(error).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid grade: 9");
}

#[tokio::test]
async fn test_deck_exists_maps_to_409() {
    let error: ApiError = SchedError::DeckExists("French".to_string()).into();
    let (status, body) = error_response(error).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A deck named 'French' already exists");
}

#[tokio::test]
async fn test_filtered_nesting_maps_to_400() {
    let error: ApiError = SchedError::FilteredDeckNesting("Cram".to_string()).into();
    let (status, _) = error_response(error).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_error_maps_to_500() {
    let error: ApiError = SchedError::Storage(anyhow::anyhow!("locked")).into();
    let (status, body) = error_response(error).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_no_current_card_response() {
    let (status, body) = error_response(ApiError::NoCurrentCard).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "No card is being studied");
}

#[test]
fn test_sched_error_display() {
    assert_eq!(
        SchedError::InvalidSearch("unbalanced parentheses".to_string()).to_string(),
        "Invalid search: unbalanced parentheses"
    );
    assert_eq!(
        SchedError::DefaultConfig.to_string(),
        "The default deck config cannot be removed"
    );
}
