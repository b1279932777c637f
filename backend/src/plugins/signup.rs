use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{appstate::AppState, config::MailConfig, mail::Mailer};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupResponse {
    pub msg: String,
}

/// Sender name and subject of the welcome mail.
#[derive(Debug, Clone)]
pub struct WelcomeTemplate {
    pub from_name: String,
    pub subject: String,
}

impl From<&MailConfig> for WelcomeTemplate {
    fn from(config: &MailConfig) -> Self {
        WelcomeTemplate {
            from_name: config.from_name.clone(),
            subject: config.signup_subject.clone(),
        }
    }
}

pub struct SignupController {
    mailer: Arc<dyn Mailer>,
    template: WelcomeTemplate,
}

impl SignupController {
    pub const BASE_PATH: &'static str = "api/signup";

    pub fn new(mailer: Arc<dyn Mailer>, template: WelcomeTemplate) -> Self {
        SignupController { mailer, template }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(Arc::clone(&state.mailer), WelcomeTemplate::from(&state.config.mail))
    }
}

mod model {
    use super::{SignupController, SignupResponse};
    use crate::mail::Email;

    impl SignupResponse {
        pub fn sent_to(email: &str) -> Self {
            SignupResponse {
                msg: format!("email_sent_to_{email}"),
            }
        }

        pub fn problem_sending() -> Self {
            SignupResponse {
                msg: "problem_sending_email".to_string(),
            }
        }
    }

    impl SignupController {
        pub(super) fn welcome_email(&self, to: &str) -> Email {
            Email::new(
                to,
                &self.template.from_name,
                &self.template.subject,
                super::view::welcome_body().into_string(),
            )
        }
    }
}

mod control {
    use std::sync::Arc;

    use axum::{Json, http::StatusCode};
    use tracing::{debug, error, info};

    use crate::controller::{Controller, RouteDescriptor};

    use super::{SignupController, SignupRequest, SignupResponse};

    impl Controller for SignupController {
        fn base_path(&self) -> Option<&str> {
            Some(Self::BASE_PATH)
        }

        fn name(&self) -> &str {
            "SignupController"
        }

        fn routes(self: Arc<Self>) -> Vec<RouteDescriptor> {
            vec![RouteDescriptor::post(
                "",
                move |Json(payload): Json<SignupRequest>| async move { self.signup(payload).await },
            )]
        }
    }

    impl SignupController {
        pub async fn signup(&self, payload: SignupRequest) -> (StatusCode, Json<SignupResponse>) {
            let email = payload.email;
            debug!(target: "user.signup", %email, "sending welcome email");
            match self.mailer.send(self.welcome_email(&email)).await {
                Ok(info) => {
                    info!(
                        target: "user.signup",
                        %email,
                        response = %info.response,
                        message_id = ?info.message_id,
                        "welcome email sent"
                    );
                    (StatusCode::OK, Json(SignupResponse::sent_to(&email)))
                }
                Err(err) => {
                    error!(
                        target: "user.signup",
                        %email,
                        ?err,
                        reason = "mail_failed",
                        "problem sending welcome email"
                    );
                    (StatusCode::BAD_REQUEST, Json(SignupResponse::problem_sending()))
                }
            }
        }
    }
}

mod view {
    use maud::{Markup, html};

    pub fn welcome_body() -> Markup {
        html! {
            h1 { "You are awesome" }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header::CONTENT_TYPE},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        error::Error,
        mail::{Email, SentInfo},
        server::Server,
    };

    struct StubMailer {
        fail: bool,
        sent: Mutex<Vec<Email>>,
    }

    impl StubMailer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(StubMailer {
                fail,
                sent: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl Mailer for StubMailer {
        async fn send(&self, email: Email) -> Result<SentInfo, Error> {
            self.sent.lock().unwrap().push(email);
            if self.fail {
                Err(Error::Mail("connection refused".into()))
            } else {
                Ok(SentInfo {
                    response: "250 OK".into(),
                    message_id: Some("<1@test>".into()),
                })
            }
        }
    }

    fn app(mailer: Arc<StubMailer>) -> Router {
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::new(config, mailer);
        let mut server = Server::new();
        server
            .add_controllers(Arc::new(SignupController::from_state(&state)), None)
            .unwrap();
        server.into_router(state)
    }

    async fn post_signup(app: Router, body: &str) -> (StatusCode, String) {
        let res = app
            .oneshot(
                Request::post("/api/signup")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn successful_send_answers_200_with_the_address() {
        let mailer = StubMailer::new(false);
        let (status, body) = post_signup(app(mailer.clone()), r#"{"email":"a@b.com"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"msg":"email_sent_to_a@b.com"}"#);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].from_name, "Overnight Developers");
        assert_eq!(sent[0].subject, "Thanks for signing up");
        assert_eq!(sent[0].html_body, "<h1>You are awesome</h1>");
        assert!(sent[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn failed_send_answers_400_without_escaping() {
        let mailer = StubMailer::new(true);
        let (status, body) = post_signup(app(mailer.clone()), r#"{"email":"a@b.com"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"msg":"problem_sending_email"}"#);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn extra_fields_are_ignored() {
        let (status, body) = post_signup(
            app(StubMailer::new(false)),
            r#"{"email":"x@y.org","name":"Someone"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"msg":"email_sent_to_x@y.org"}"#);
    }

    #[tokio::test]
    async fn missing_email_is_rejected_before_sending() {
        let mailer = StubMailer::new(false);
        let (status, _) = post_signup(app(mailer.clone()), r#"{"name":"Someone"}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_post_is_routed() {
        let res = app(StubMailer::new(false))
            .oneshot(Request::get("/api/signup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn handler_can_be_called_directly() {
        let mailer = StubMailer::new(true);
        let template = WelcomeTemplate {
            from_name: "Team".into(),
            subject: "Welcome".into(),
        };
        let controller = SignupController::new(mailer.clone(), template);
        let (status, axum::Json(body)) = controller
            .signup(SignupRequest {
                email: "a@b.com".into(),
            })
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, SignupResponse::problem_sending());
        assert_eq!(mailer.sent.lock().unwrap()[0].subject, "Welcome");
    }
}
