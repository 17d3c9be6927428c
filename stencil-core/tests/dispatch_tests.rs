use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stencil_core::validation::{ValidationError, Validate, rules};
use stencil_core::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct Note {
    title: String,
    body: String,
}

impl Validate for Note {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        rules::required(&self.title, "title", &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl Param for Note {
    const CLASS: TypeClass = TypeClass::Structured;

    fn bind(raw: Raw<'_>) -> Result<Self, String> {
        decode::decode_structured_lenient(raw)
    }

    fn empty() -> Option<Self> {
        None
    }

    fn check(&self) -> Vec<ValidationError> {
        self.validate().err().unwrap_or_default()
    }
}

#[derive(Default)]
struct Notes {
    calls: AtomicUsize,
}

impl Notes {
    fn get_note(&self, id: i32) -> Note {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Note {
            title: format!("note {}", id),
            body: String::new(),
        }
    }

    fn create_note(&self, note: Note) -> Note {
        self.calls.fetch_add(1, Ordering::SeqCst);
        note
    }

    fn fail(&self) -> Result<(), String> {
        Err("disk full".to_string())
    }

    fn explode(&self) {
        panic!("kaboom")
    }

    fn whoami(&self, context: RequestContext) -> HttpResponse {
        context.response().set_status(299);
        HttpResponse::new(203).with_body(context.route().as_bytes().to_vec())
    }

    fn accepted(&self, response: ResponseHandle, cancel: tokio_util::sync::CancellationToken) {
        response.set_status(202);
        response.insert_header("X-Cancelled", cancel.is_cancelled().to_string());
    }
}

macro_rules! this {
    ($instance:expr) => {
        match $instance.downcast::<Notes>() {
            Ok(this) => this,
            Err(_) => return Outcome::faulted("wrong instance"),
        }
    };
}

macro_rules! arg {
    ($args:expr, $ty:ty, $index:expr) => {
        match $args.take::<$ty>($index) {
            Ok(value) => value,
            Err(outcome) => return outcome,
        }
    };
}

impl ServiceModule for Notes {
    fn metadata() -> ServiceMeta {
        ServiceMeta::new::<Notes>()
            .prefix("/notes")
            .operation(
                OperationMeta::new("get_note", |instance, mut args| {
                    Box::pin(async move {
                        let this = this!(instance);
                        Outcome::json(&this.get_note(arg!(args, i32, 0)))
                    })
                })
                .param(ParamMeta::of::<i32>("id", None)),
            )
            .operation(
                OperationMeta::new("create_note", |instance, mut args| {
                    Box::pin(async move {
                        let this = this!(instance);
                        Outcome::json(&this.create_note(arg!(args, Note, 0)))
                    })
                })
                .param(ParamMeta::of::<Note>("note", None)),
            )
            .operation(OperationMeta::new("fail", |instance, _| {
                Box::pin(async move {
                    let this = this!(instance);
                    match this.fail() {
                        Ok(()) => Outcome::empty(),
                        Err(e) => Outcome::faulted(e),
                    }
                })
            }))
            .operation(OperationMeta::new("explode", |instance, _| {
                Box::pin(async move {
                    let this = this!(instance);
                    this.explode();
                    Outcome::empty()
                })
            }))
            .operation(
                OperationMeta::new("whoami", |instance, mut args| {
                    Box::pin(async move {
                        let this = this!(instance);
                        Outcome::response(this.whoami(arg!(args, RequestContext, 0)))
                    })
                })
                .param(ParamMeta::of::<RequestContext>("context", None))
                .method("GET"),
            )
            .operation(
                OperationMeta::new("accepted", |instance, mut args| {
                    Box::pin(async move {
                        let this = this!(instance);
                        let response = arg!(args, ResponseHandle, 0);
                        let cancel = arg!(args, tokio_util::sync::CancellationToken, 1);
                        this.accepted(response, cancel);
                        Outcome::empty()
                    })
                })
                .param(ParamMeta::of::<ResponseHandle>("response", None))
                .param(ParamMeta::of::<tokio_util::sync::CancellationToken>("cancel", None)),
            )
    }
}

fn app(config: EngineConfig, notes: Option<Arc<Notes>>) -> Application {
    let container = Container::new();
    if let Some(notes) = notes {
        container.register_arc(notes);
    }
    Application::builder()
        .config(config)
        .container(container)
        .module::<Notes>()
        .build()
}

#[tokio::test]
async fn test_path_parameter_dispatch() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let response = app.handle(HttpRequest::new("GET", "/notes/getnote/3")).await;

    assert_eq!(response.status, 200);
    let note: Note = response.json().unwrap();
    assert_eq!(note.title, "note 3");
}

#[tokio::test]
async fn test_json_body_dispatch() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let note = Note {
        title: "hello".into(),
        body: "world".into(),
    };
    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_json(&note)
        .unwrap();

    let response = app.handle(request).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json::<Note>().unwrap(), note);
}

#[tokio::test]
async fn test_form_body_dispatch() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_form(&[("title", "from form"), ("unknown", "x")])
        .unwrap();

    let response = app.handle(request).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json::<Note>().unwrap().title, "from form");
}

#[tokio::test]
async fn test_validation_failure_skips_invocation() {
    let notes = Arc::new(Notes::default());
    let app = app(EngineConfig::default().with_validation(true), Some(notes.clone()));
    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_json(&Note::default())
        .unwrap();

    let response = app.handle(request).await;
    assert_eq!(response.status, 400);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["errors"][0]["field"], "title");
    assert_eq!(notes.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_validation_off_by_default() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_json(&Note::default())
        .unwrap();

    assert_eq!(app.handle(request).await.status, 200);
}

#[tokio::test]
async fn test_registered_validator_runs() {
    let notes = Arc::new(Notes::default());
    let container = Container::new();
    container.register_arc(notes);
    let app = Application::builder()
        .config(EngineConfig::default().with_validation(true))
        .container(container)
        .module::<Notes>()
        .validator::<Note, _>(|note: &Note| {
            if note.body.len() > 5 {
                vec![ValidationError::new("body", "body is too long").with_constraint("maxLength")]
            } else {
                Vec::new()
            }
        })
        .build();

    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_json(&Note {
            title: "t".into(),
            body: "far too long".into(),
        })
        .unwrap();
    let response = app.handle(request).await;
    assert_eq!(response.status, 400);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["errors"][0]["constraint"], "maxLength");
}

#[tokio::test]
async fn test_unresolvable_service_is_500() {
    let app = app(EngineConfig::default(), None);
    let before = app.catalog().len();

    let response = app.handle(HttpRequest::new("GET", "/notes/getnote/1")).await;
    assert_eq!(response.status, 500);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["status"], 500);
    assert_eq!(app.catalog().len(), before);
}

#[tokio::test]
async fn test_bind_failure_is_500_naming_parameter() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let response = app.handle(HttpRequest::new("GET", "/notes/getnote/abc")).await;

    assert_eq!(response.status, 500);
    let body: serde_json::Value = response.json().unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("`id`"));
    assert!(message.contains("i32"));
}

#[tokio::test]
async fn test_malformed_json_is_500() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let request = HttpRequest::new("POST", "/notes/createnote")
        .with_header("Content-Type", "application/json")
        .with_body("{oops");

    assert_eq!(app.handle(request).await.status, 500);
}

#[tokio::test]
async fn test_errors_and_panics_are_faults() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));

    let failed = app.handle(HttpRequest::new("GET", "/notes/fail")).await;
    assert_eq!(failed.status, 500);
    let body: serde_json::Value = failed.json().unwrap();
    assert_eq!(body["error"], "disk full");

    let exploded = app.handle(HttpRequest::new("GET", "/notes/explode")).await;
    assert_eq!(exploded.status, 500);
    let body: serde_json::Value = exploded.json().unwrap();
    assert_eq!(body["error"], "kaboom");

    // The application keeps serving
    assert_eq!(app.handle(HttpRequest::new("GET", "/notes/getnote/1")).await.status, 200);
}

#[tokio::test]
async fn test_injected_handles() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));

    let whoami = app.handle(HttpRequest::new("GET", "/notes/whoami")).await;
    assert_eq!(whoami.status, 203);
    assert_eq!(whoami.body, b"/notes/whoami");

    let accepted = app.handle(HttpRequest::new("POST", "/notes/accepted")).await;
    assert_eq!(accepted.status, 202);
    assert_eq!(accepted.header("x-cancelled"), Some("false"));
}

#[tokio::test]
async fn test_unknown_routes_and_verbs() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));

    assert_eq!(app.handle(HttpRequest::new("GET", "/nowhere")).await.status, 404);

    let response = app.handle(HttpRequest::new("DELETE", "/notes/getnote/1")).await;
    assert_eq!(response.status, 405);
    assert_eq!(response.header("allow"), Some("GET"));
}

#[tokio::test]
async fn test_query_string_in_path_is_parsed() {
    let app = app(EngineConfig::default(), Some(Arc::new(Notes::default())));
    let response = app
        .handle(HttpRequest::new("GET", "/NOTES/GetNote/5?unused=1"))
        .await;
    assert_eq!(response.status, 200);
}
