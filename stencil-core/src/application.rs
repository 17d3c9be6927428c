// Application bootstrapper and HTTP server

use crate::catalog::{CatalogBuilder, EndpointCatalog};
use crate::config::EngineConfig;
use crate::container::{Container, ServiceResolver};
use crate::context::RequestContext;
use crate::dispatch::Dispatcher;
use crate::http::parse_query_string;
use crate::logging::{debug, error, info};
use crate::metadata::ServiceModule;
use crate::routing::{RouteMatch, Router};
use crate::pipeline::ValidationPipeline;
use crate::{Error, HttpRequest, HttpResponse};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use stencil_validation::{TypeValidator, ValidatorRegistry};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Assembles the catalog, router and dispatcher of an [`Application`]
pub struct ApplicationBuilder {
    config: EngineConfig,
    container: Container,
    resolver: Option<Arc<dyn ServiceResolver>>,
    modules: CatalogBuilder,
    validators: ValidatorRegistry,
}

impl ApplicationBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            container: Container::new(),
            resolver: None,
            modules: CatalogBuilder::new(),
            validators: ValidatorRegistry::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve services from this container
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Resolve services through a custom resolver instead of the container
    pub fn resolver(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Register a singleton service instance in the container
    pub fn provide<T: Send + Sync + 'static>(self, instance: T) -> Self {
        self.container.register(instance);
        self
    }

    /// Expose one service module
    pub fn module<S: ServiceModule>(mut self) -> Self {
        self.modules = self.modules.module::<S>();
        self
    }

    /// Expose every module registered through `#[service]`
    pub fn discover(mut self) -> Self {
        self.modules = self.modules.discover();
        self
    }

    /// Register the validator for structured type `T`
    pub fn validator<T, V>(mut self, validator: V) -> Self
    where
        T: 'static,
        V: TypeValidator<T> + 'static,
    {
        self.validators.register::<T, V>(validator);
        self
    }

    pub fn build(self) -> Application {
        let catalog = Arc::new(
            self.modules
                .route_style(self.config.route_style)
                .build(),
        );
        let router = Arc::new(Router::from_catalog(&catalog));
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(self.container.clone()));
        let dispatcher = Dispatcher::new(
            resolver,
            ValidationPipeline::new(self.config.validation_enabled, self.validators),
            self.config.missing_params,
        );

        info!(
            endpoints = catalog.len(),
            routes = router.len(),
            validation = self.config.validation_enabled,
            "Application built"
        );

        Application {
            config: self.config,
            container: self.container,
            catalog,
            router,
            dispatcher,
        }
    }
}

/// The main application struct
#[derive(Clone)]
pub struct Application {
    config: EngineConfig,
    container: Container,
    catalog: Arc<EndpointCatalog>,
    router: Arc<Router>,
    dispatcher: Dispatcher,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a reference to the DI container
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn catalog(&self) -> &Arc<EndpointCatalog> {
        &self.catalog
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Route and dispatch one request.
    ///
    /// Dropping the returned future before it completes cancels the
    /// request's cancellation token.
    pub async fn handle(&self, mut request: HttpRequest) -> HttpResponse {
        if let Some((path, query)) = request.path.split_once('?') {
            let query = parse_query_string(query);
            request.path = path.to_string();
            request.query_params.extend(query);
        }

        let (route, params) = match self.router.lookup(&request.method, &request.path) {
            RouteMatch::Found { route, params } => (route, params),
            RouteMatch::MethodNotAllowed { allowed } => {
                let allow = allowed
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Error::MethodNotAllowed(format!("{} {}", request.method, request.path))
                    .to_response()
                    .with_header("Allow", allow);
            }
            RouteMatch::NotFound => {
                return Error::RouteNotFound(format!("{} {}", request.method, request.path))
                    .to_response();
            }
        };

        debug!(method = %request.method, path = %request.path, route = %route.template, "Dispatching request");
        request.path_params = params;

        let cancellation = CancellationToken::new();
        let guard = cancellation.clone().drop_guard();
        let context = RequestContext::new(request, route.template.clone(), route.method, cancellation);

        let response = self.dispatcher.dispatch(&route.endpoint, &context).await;
        guard.disarm();
        response
    }

    /// Serve on the configured host and port
    pub async fn listen(self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.address()).await?;
        self.serve(listener).await
    }

    /// Serve HTTP/1.1 connections from a bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        info!(address = %listener.local_addr()?, "Server listening");

        let app = Arc::new(self);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { handle_request(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = ?err, "Error serving connection");
                }
            });
        }
    }
}

/// Handle an incoming HTTP request
async fn handle_request(
    req: Request<IncomingBody>,
    app: Arc<Application>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let mut request = HttpRequest::from_target(req.method().as_str(), &target);

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    request.body = req.collect().await?.to_bytes().to_vec();

    let response = app.handle(request).await;

    let mut builder = Response::builder().status(response.status);
    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }

    let body = Full::new(bytes::Bytes::from(response.body));
    Ok(builder.body(body).unwrap_or_else(|e| {
        error!(error = %e, "Invalid response parts");
        let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
        *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    }))
}
