use crate::HttpStatusCode;

#[test]
fn given_200_when_checked_then_is_ok_and_success() {
    let status = HttpStatusCode::from(200);

    assert!(status.is_ok());
    assert!(status.is_success());
    assert_eq!(status, HttpStatusCode::OK);
}

/// **VALUE**: A 204 or 302-after-redirect is "successful" HTTP but not the exact 200 the
/// login classifier requires.
///
/// **BUG THIS CATCHES**: Would catch if `is_ok()` is widened to the whole 2xx range,
/// which would let an empty 204 from a misconfigured gateway pass as a login.
#[test]
fn given_non_200_success_when_checked_then_is_success_but_not_ok() {
    let status = HttpStatusCode(204);

    assert!(!status.is_ok());
    assert!(status.is_success());
}

#[test]
fn given_status_when_displayed_then_bare_number() {
    assert_eq!(HttpStatusCode(503).to_string(), "503");
}
