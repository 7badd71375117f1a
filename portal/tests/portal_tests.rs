/// End-to-end tests for the portal service stack.
///
/// Requests are driven through `app(state)` with `oneshot`, so every test
/// passes through the timeout layer, the access guard and the page router.

#[cfg(test)]
mod support {
    use std::convert::Infallible;
    use std::fs;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use http_body_util::combinators::BoxBody;
    use hyper::{Request, Response};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use portal::{AppState, app};
    use shared::config::parse_config;

    pub struct Portal {
        pub state: AppState,
        _web: tempfile::TempDir,
    }

    impl Portal {
        pub fn new() -> Self {
            let web = tempfile::tempdir().unwrap();
            let root = web.path();
            fs::write(root.join("index.html"), "landing").unwrap();
            fs::write(root.join("login.html"), "login form").unwrap();
            fs::write(root.join("about.html"), "sobre").unwrap();
            fs::create_dir_all(root.join("admin")).unwrap();
            fs::write(root.join("admin/students.html"), "alunos").unwrap();
            fs::write(root.join("admin/admin.html"), "admin only").unwrap();
            fs::create_dir_all(root.join("aluno/trilhas")).unwrap();
            fs::write(root.join("aluno/trilhas/index.html"), "trilhas").unwrap();

            let config = parse_config(&format!(
                "[paths]\nweb_dir = {:?}\n",
                root.to_str().unwrap()
            ))
            .unwrap();

            Self {
                state: AppState::new(config).unwrap(),
                _web: web,
            }
        }

        pub async fn send(&self, req: Request<()>) -> Response<BoxBody<Bytes, Infallible>> {
            app(self.state.clone()).oneshot(req).await.unwrap()
        }

        pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<BoxBody<Bytes, Infallible>> {
            let mut builder = Request::get(path);
            if let Some(cookie) = cookie {
                builder = builder.header("cookie", cookie);
            }
            self.send(builder.body(()).unwrap()).await
        }
    }

    pub fn session_cookie(roles: &[&str]) -> String {
        session_cookie_with(json!({"sub": "101", "role": roles, "user": {"nome": "Ana"}}))
    }

    pub fn session_cookie_with(claims: Value) -> String {
        format!(
            "token=h.{}.s",
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    pub async fn body_text(res: Response<BoxBody<Bytes, Infallible>>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(res: Response<BoxBody<Bytes, Infallible>>) -> Value {
        serde_json::from_str(&body_text(res).await).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Access guard layer
// ---------------------------------------------------------------------------
#[cfg(test)]
mod guard_tests {
    use super::support::*;
    use hyper::{StatusCode, header};

    #[tokio::test]
    async fn anonymous_protected_page_redirects_to_login_and_clears_cookie() {
        let portal = Portal::new();
        let res = portal.get("/aluno/dashboard?aba=notas", None).await;

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/login?aba=notas");
        assert_eq!(
            res.headers()[header::SET_COOKIE],
            "token=; Max-Age=0; Path=/; HttpOnly; Secure"
        );
    }

    #[tokio::test]
    async fn teacher_sees_student_management_with_identity_headers() {
        let portal = Portal::new();
        let cookie = session_cookie(&["TEACHER"]);
        let res = portal.get("/admin/students", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-user-id"], "101");
        assert_eq!(res.headers()["x-user-roles"], "TEACHER");
        assert_eq!(body_text(res).await, "alunos");
    }

    #[tokio::test]
    async fn teacher_is_redirected_away_from_admin_admin() {
        let portal = Portal::new();
        let cookie = session_cookie(&["TEACHER"]);
        let res = portal.get("/admin/admin", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/professor/dashboard");
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn signed_in_student_skips_login() {
        let portal = Portal::new();
        let cookie = session_cookie(&["STUDENT"]);
        let res = portal.get("/login", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/aluno/dashboard");
    }

    #[tokio::test]
    async fn anonymous_login_page_is_served() {
        let portal = Portal::new();
        let res = portal.get("/login", None).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "login form");
    }

    #[tokio::test]
    async fn admin_root_goes_to_admin_dashboard() {
        let portal = Portal::new();
        let cookie = session_cookie(&["ADMIN"]);
        let res = portal.get("/", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/admin");
    }

    #[tokio::test]
    async fn public_page_is_served_without_session() {
        let portal = Portal::new();
        let res = portal.get("/about", None).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-user-id").is_none());
        assert_eq!(body_text(res).await, "sobre");
    }

    #[tokio::test]
    async fn url_encoded_quoted_bearer_cookie_is_accepted() {
        let portal = Portal::new();
        let bare = session_cookie(&["STUDENT"]);
        let token = bare.trim_start_matches("token=");
        let cookie = format!("theme=dark; token=%22Bearer%20{}%22", token);
        let res = portal.get("/aluno/trilhas", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "trilhas");
    }

    #[tokio::test]
    async fn expired_session_is_sent_to_login() {
        let portal = Portal::new();
        let cookie = session_cookie_with(serde_json::json!({
            "sub": "101", "role": ["ADMIN"], "exp": 1
        }));
        let res = portal.get("/admin", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn spoofed_identity_headers_do_not_leak_through() {
        let portal = Portal::new();
        let req = hyper::Request::get("/about")
            .header("x-user-id", "1")
            .header("x-user-roles", "ADMIN")
            .body(())
            .unwrap();
        let res = portal.send(req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-user-roles").is_none());
    }
}

// ---------------------------------------------------------------------------
// Path spelling
// ---------------------------------------------------------------------------
#[cfg(test)]
mod path_tests {
    use super::support::*;
    use hyper::{StatusCode, header};

    /// Status, location and body for a request, after following at most one
    /// normalizing redirect to `canonical`.
    async fn outcome(
        portal: &Portal,
        path: &str,
        canonical: &str,
        cookie: Option<&str>,
    ) -> (StatusCode, Option<String>, String) {
        let mut res = portal.get(path, cookie).await;
        if path != canonical {
            assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "{}", path);
            assert_eq!(res.headers()[header::LOCATION], canonical, "{}", path);
            assert!(res.headers().get(header::SET_COOKIE).is_none());
            res = portal.get(canonical, cookie).await;
        }
        let location = res
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        (res.status(), location, body_text(res).await)
    }

    #[tokio::test]
    async fn anonymous_cannot_reach_admin_page_through_extra_slashes() {
        let portal = Portal::new();
        let expected = outcome(&portal, "/admin/admin", "/admin/admin", None).await;
        assert_eq!(expected.1.as_deref(), Some("/login"));

        for path in ["//admin/admin", "/admin//admin", "/admin/./admin", "/cursos/../admin/admin"] {
            assert_eq!(outcome(&portal, path, "/admin/admin", None).await, expected, "{}", path);
        }
    }

    #[tokio::test]
    async fn teacher_cannot_reach_admin_page_through_dot_segments() {
        let portal = Portal::new();
        let cookie = session_cookie(&["TEACHER"]);
        let expected = outcome(&portal, "/admin/admin", "/admin/admin", Some(&cookie)).await;
        assert_eq!(expected.0, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(expected.1.as_deref(), Some("/professor/dashboard"));

        for path in ["/admin//admin", "/admin/./admin", "//admin/admin", "/admin/admin/."] {
            assert_eq!(
                outcome(&portal, path, "/admin/admin", Some(&cookie)).await,
                expected,
                "{}",
                path
            );
        }
    }

    #[tokio::test]
    async fn trailing_slash_keeps_the_role_rule() {
        let portal = Portal::new();
        let teacher = session_cookie(&["TEACHER"]);
        let res = portal.get("/admin/admin/", Some(&teacher)).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/professor/dashboard");

        let admin = session_cookie(&["ADMIN"]);
        let res = portal.get("/admin/admin/", Some(&admin)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "admin only");
    }

    #[tokio::test]
    async fn admin_still_reaches_admin_page_after_normalizing() {
        let portal = Portal::new();
        let cookie = session_cookie(&["ADMIN"]);
        let (status, _, body) = outcome(&portal, "/admin/./admin", "/admin/admin", Some(&cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin only");
    }

    #[tokio::test]
    async fn normalizing_redirect_keeps_the_query() {
        let portal = Portal::new();
        let res = portal.get("//about?lang=pt", None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/about?lang=pt");
    }
}

// ---------------------------------------------------------------------------
// Portal endpoints
// ---------------------------------------------------------------------------
#[cfg(test)]
mod endpoint_tests {
    use super::support::*;
    use hyper::{Method, Request, StatusCode, header};

    #[tokio::test]
    async fn health_reports_ok() {
        let portal = Portal::new();
        let res = portal.get("/health", None).await;

        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["health"], "ok");
    }

    #[tokio::test]
    async fn signout_clears_both_cookies() {
        let portal = Portal::new();
        let req = Request::post("/api/auth/signout").body(()).unwrap();
        let res = portal.send(req).await;

        assert_eq!(res.status(), StatusCode::OK);
        let cookies: Vec<_> = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            cookies,
            vec![
                "token=; Max-Age=0; Path=/; HttpOnly; Secure",
                "userId=; Max-Age=0; Path=/; HttpOnly; Secure",
            ]
        );
        assert_eq!(body_json(res).await["message"], "Signed out");
    }

    #[tokio::test]
    async fn signout_only_accepts_post() {
        let portal = Portal::new();
        let res = portal.get("/api/auth/signout", None).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn session_endpoint_reports_the_principal() {
        let portal = Portal::new();
        let cookie = session_cookie(&["STUDENT", "USER"]);
        let res = portal.get("/api/session", Some(&cookie)).await;

        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["data"]["sub"], "101");
        assert_eq!(json["data"]["roles"], serde_json::json!(["STUDENT", "USER"]));
        assert_eq!(json["data"]["user"]["nome"], "Ana");
        assert_eq!(json["data"]["dashboard"], "/aluno/dashboard");
    }

    #[tokio::test]
    async fn session_endpoint_without_cookie_is_unauthorized() {
        let portal = Portal::new();
        let res = portal.get("/api/session", None).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unknown_page_is_json_404() {
        let portal = Portal::new();
        let res = portal.get("/nao-existe", None).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_json(res).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn traversal_is_clamped_to_the_web_root() {
        let portal = Portal::new();
        let res = portal.get("/../../etc/passwd", None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[header::LOCATION], "/etc/passwd");

        let res = portal.get("/etc/passwd", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_methods_are_405() {
        let portal = Portal::new();
        let req = Request::builder()
            .method(Method::DELETE)
            .uri("/about")
            .body(())
            .unwrap();
        let res = portal.send(req).await;

        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(res).await["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn head_is_served_like_get() {
        let portal = Portal::new();
        let req = Request::head("/about").body(()).unwrap();
        let res = portal.send(req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}

// ---------------------------------------------------------------------------
// Timeout layer
// ---------------------------------------------------------------------------
#[cfg(test)]
mod timeout_tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use hyper::{Request, Response, StatusCode};
    use tower::{Layer, ServiceExt, service_fn};

    use portal::handlers::http::utils::full;
    use portal::tower_middle::TimeoutLayer;

    #[tokio::test]
    async fn slow_service_answers_408() {
        let slow = service_fn(|_req: Request<()>| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Infallible>(Response::new(full("late")))
        });
        let service = TimeoutLayer::new(Duration::from_millis(20)).layer(slow);

        let res = service.oneshot(Request::new(())).await.unwrap();
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn fast_service_is_untouched() {
        let fast = service_fn(|_req: Request<()>| async {
            Ok::<_, Infallible>(Response::new(full("on time")))
        });
        let service = TimeoutLayer::new(Duration::from_secs(1)).layer(fast);

        let res = service.oneshot(Request::new(())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
