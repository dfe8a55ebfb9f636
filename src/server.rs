// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use multer::Multipart;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Language;
use crate::llm::ChatBackend;
use crate::threat::{self, ThreatForm, UploadedImage};
use crate::utils::errors::Error;

pub const THREAT_ROUTE: &str = "/analisar_ameacas";

pub struct AppState {
    /// `None` only makes sense together with `simulate`.
    pub backend: Option<Arc<dyn ChatBackend>>,
    pub simulate: bool,
    pub lang: Language,
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

// any origin, method and header is allowed
fn add_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
}

pub async fn handle(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    let mut response = route(req, &state).await;
    add_cors(response.headers_mut());
    Ok(response)
}

async fn route(req: Request<Body>, state: &AppState) -> Response<Body> {
    let path = req.uri().path().trim_end_matches('/').to_string();
    match (req.method().clone(), path.as_str()) {
        (Method::OPTIONS, _) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        }
        (Method::POST, THREAT_ROUTE) => analyze_threats(req, state).await,
        (_, THREAT_ROUTE) => error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        _ => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn analyze_threats(req: Request<Body>, state: &AppState) -> Response<Body> {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(Error::Form(message)) => {
            warn!(%message, "rejected threat model form");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &message);
        }
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    };

    let result = match (&state.backend, state.simulate) {
        (_, true) => Ok(threat::simulate(&form)),
        (Some(backend), false) => threat::analyze(backend.as_ref(), &form, state.lang).await,
        (None, false) => Err(Error::Config("no model backend configured".to_string())),
    };

    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(err) => {
            error!(error = %err, "threat model generation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn form_error(err: multer::Error) -> Error {
    Error::Form(err.to_string())
}

async fn read_form(req: Request<Body>) -> Result<ThreatForm, Error> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Form("expected a multipart/form-data body".to_string()))?;
    let boundary = multer::parse_boundary(content_type).map_err(form_error)?;
    let mut multipart = Multipart::new(req.into_body(), boundary);

    let mut application_type = None;
    let mut authentication = None;
    let mut internet_facing = None;
    let mut sensitive_data = None;
    let mut description = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let slot = match name.as_str() {
            "imagem" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(|m| m.to_string());
                let bytes = field.bytes().await.map_err(form_error)?;
                image = Some(UploadedImage {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
                continue;
            }
            "tipo_aplicacao" => &mut application_type,
            "autenticacao" => &mut authentication,
            "acesso_internet" => &mut internet_facing,
            "dados_sensiveis" => &mut sensitive_data,
            "descricao_aplicacao" => &mut description,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(form_error)?);
    }

    let required = |value: Option<String>, name: &str| {
        value.ok_or_else(|| Error::Form(format!("missing field: {name}")))
    };
    Ok(ThreatForm {
        application_type: required(application_type, "tipo_aplicacao")?,
        authentication: required(authentication, "autenticacao")?,
        internet_facing: required(internet_facing, "acesso_internet")?,
        sensitive_data: required(sensitive_data, "dados_sensiveis")?,
        description: required(description, "descricao_aplicacao")?,
        image: image.ok_or_else(|| Error::Form("missing field: imagem".to_string()))?,
    })
}

/// Serves the threat-model endpoint until ctrl-c.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), hyper::Error> {
    let make = make_service_fn(move |_| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone()))) }
    });
    let server = Server::try_bind(&addr)?.serve(make);
    info!(addr = %server.local_addr(), route = THREAT_ROUTE, "threat model server listening");
    server
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::ChatRequest;

    const BOUNDARY: &str = "X-UNITGEN-BOUNDARY";

    struct Canned {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ChatBackend for Canned {
        async fn complete(&self, _request: &ChatRequest) -> Result<Value, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Dispatch("status 500: upstream".to_string()));
            }
            Ok(json!({"choices": [{"message": {"content": "{\"threat_model\": []}"}}]}))
        }
    }

    fn state(simulate: bool, fail: bool) -> (Arc<AppState>, Arc<Canned>) {
        let backend = Arc::new(Canned {
            calls: AtomicUsize::new(0),
            fail,
        });
        let state = Arc::new(AppState {
            backend: Some(backend.clone()),
            simulate,
            lang: Language::English,
        });
        (state, backend)
    }

    fn multipart_body(skip: Option<&str>) -> String {
        let mut body = String::new();
        let fields = [
            ("tipo_aplicacao", "Web"),
            ("autenticacao", "OAuth2"),
            ("acesso_internet", "Yes"),
            ("dados_sensiveis", "PII"),
            ("descricao_aplicacao", "Online store"),
        ];
        for (name, value) in fields {
            if Some(name) == skip {
                continue;
            }
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        if skip != Some("imagem") {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"imagem\"; filename=\"diagram.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn post(path: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn forwards_form_to_model() {
        let (state, backend) = state(false, false);
        let response = handle(post("/analisar_ameacas", multipart_body(None)), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            HeaderValue::from_static("*")
        );
        let body = body_json(response).await;
        assert_eq!(body["choices"][0]["message"]["content"], "{\"threat_model\": []}");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trailing_slash_and_simulation() {
        let (state, backend) = state(true, false);
        let response = handle(post("/analisar_ameacas/", multipart_body(None)), state)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let content = body["choices"][0]["message"]["content"].as_str().unwrap();
        assert!(content.contains("Authentication: OAuth2"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        for skip in ["imagem", "dados_sensiveis"] {
            let (state, backend) = state(false, false);
            let response = handle(post(THREAT_ROUTE, multipart_body(Some(skip))), state)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body = body_json(response).await;
            assert!(body["error"].as_str().unwrap().contains(skip));
            assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn model_failure_is_an_error_envelope() {
        let (state, _) = state(false, true);
        let response = handle(post(THREAT_ROUTE, multipart_body(None)), state)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("upstream"));
    }

    #[tokio::test]
    async fn unconfigured_backend() {
        let state = Arc::new(AppState {
            backend: None,
            simulate: false,
            lang: Language::English,
        });
        let response = handle(post(THREAT_ROUTE, multipart_body(None)), state)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn preflight_and_unknown_routes() {
        let (state, _) = state(false, false);
        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri(THREAT_ROUTE)
            .body(Body::empty())
            .unwrap();
        let response = handle(preflight, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));

        let missing = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let response = handle(missing, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let wrong_method = Request::builder()
            .uri(THREAT_ROUTE)
            .body(Body::empty())
            .unwrap();
        let response = handle(wrong_method, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn non_multipart_body() {
        let (state, _) = state(false, false);
        let request = Request::builder()
            .method(Method::POST)
            .uri(THREAT_ROUTE)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = handle(request, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
