//! 发信侧 API 鉴权中间件
//!
//! Bearer Token 鉴权，覆盖 /api 作用域（改写、webhook、分析、重建）。
//! 追踪端点（像素 / 重定向）不经过这里：收件人的浏览器不可能带 token。
//!
//! Token 未配置时整个 API 返回 404（与“端点不存在”不可区分）。
//! Token 比较用常数时间，避免时间侧信道。

use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::{Method, header::CONTENT_TYPE},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::api::services::ApiResponse;

/// API 鉴权中间件
#[derive(Clone)]
pub struct ApiAuth {
    token: Rc<String>,
}

impl ApiAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Rc::new(token.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiAuthMiddleware {
            service: Rc::new(service),
            token: Rc::clone(&self.token),
        }))
    }
}

pub struct ApiAuthMiddleware<S> {
    service: Rc<S>,
    token: Rc<String>,
}

impl<S, B> ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    /// CORS 预检直接放行
    fn handle_options(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        req.into_response(
            HttpResponse::NoContent()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .finish()
                .map_into_right_body(),
        )
    }

    /// Token 未配置：API 当作不存在
    fn handle_disabled(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        debug!("API token 未配置，返回 404");
        req.into_response(
            HttpResponse::NotFound()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .body("Not Found")
                .map_into_right_body(),
        )
    }

    fn handle_unauthorized(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        info!("API 鉴权失败：token 缺失或不匹配");
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                .json(ApiResponse::<()>::error(
                    401,
                    "Unauthorized: invalid or missing token",
                ))
                .map_into_right_body(),
        )
    }

    fn extract_bearer_token(req: &ServiceRequest) -> Option<&str> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
    }

    fn token_matches(expected: &str, provided: &str) -> bool {
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl<S, B> Service<ServiceRequest> for ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.method() == Method::OPTIONS {
            return Box::pin(ready(Ok(Self::handle_options(req))));
        }

        if self.token.is_empty() {
            return Box::pin(ready(Ok(Self::handle_disabled(req))));
        }

        let authorized = Self::extract_bearer_token(&req)
            .map(|provided| Self::token_matches(&self.token, provided))
            .unwrap_or(false);

        if !authorized {
            return Box::pin(ready(Ok(Self::handle_unauthorized(req))));
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_compare_is_exact() {
        assert!(ApiAuthMiddleware::<DummyService>::token_matches(
            "secret-token",
            "secret-token"
        ));
        assert!(!ApiAuthMiddleware::<DummyService>::token_matches(
            "secret-token",
            "secret-toke"
        ));
        assert!(!ApiAuthMiddleware::<DummyService>::token_matches(
            "secret-token",
            ""
        ));
    }

    // token_matches 不触碰 service，占位类型即可
    struct DummyService;
    impl Service<ServiceRequest> for DummyService {
        type Response = ServiceResponse<actix_web::body::BoxBody>;
        type Error = Error;
        type Future = Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(
            &self,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&self, _req: ServiceRequest) -> Self::Future {
            unimplemented!()
        }
    }
}
