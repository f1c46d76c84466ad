use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::trace;

use crate::analytics::CounterStore;
use crate::utils::ip::{TrustedProxies, extract_client_ip};

/// 没有拿到客户端 IP 时使用的访客 key
const UNKNOWN_VISITOR: &str = "unknown";

/// 跳转服务共享状态
pub struct RedirectState {
    links: HashMap<String, String>,
    not_found_url: String,
    trusted_proxies: TrustedProxies,
    store: Arc<CounterStore>,
}

impl RedirectState {
    pub fn new(
        links: HashMap<String, String>,
        not_found_url: impl Into<String>,
        trusted_proxies: TrustedProxies,
        store: Arc<CounterStore>,
    ) -> Self {
        Self {
            links,
            not_found_url: not_found_url.into(),
            trusted_proxies,
            store,
        }
    }

    pub fn store(&self) -> &Arc<CounterStore> {
        &self.store
    }
}

pub struct RedirectService {}

impl RedirectService {
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        state: web::Data<RedirectState>,
    ) -> HttpResponse {
        let short = path.into_inner();

        let Some(target) = state.links.get(&short) else {
            trace!("Unknown short link rejected: {}", &short);
            return Self::redirect(StatusCode::TEMPORARY_REDIRECT, &state.not_found_url);
        };

        let visitor = extract_client_ip(&req, &state.trusted_proxies);
        state
            .store
            .record(&short, visitor.as_deref().unwrap_or(UNKNOWN_VISITOR));

        Self::redirect(StatusCode::TEMPORARY_REDIRECT, target)
    }

    /// 未匹配任何路由
    pub async fn handle_no_route(state: web::Data<RedirectState>) -> HttpResponse {
        Self::redirect(StatusCode::PERMANENT_REDIRECT, &state.not_found_url)
    }

    #[inline]
    fn redirect(status: StatusCode, location: &str) -> HttpResponse {
        HttpResponse::build(status)
            .insert_header(("Location", location))
            .finish()
    }
}

/// 短链接路由：`{prefix}/{short}`
pub fn redirect_routes(prefix: &str) -> actix_web::Scope {
    web::scope(prefix)
        .route("/{short}", web::get().to(RedirectService::handle_redirect))
        .route("/{short}", web::head().to(RedirectService::handle_redirect))
        .default_service(web::to(RedirectService::handle_no_route))
}

/// 注册短链接路由，前缀以外的路径同样 308 到未命中页面
pub fn configure_redirect(prefix: &str) -> impl FnOnce(&mut web::ServiceConfig) {
    let scope = redirect_routes(prefix);
    move |cfg| {
        cfg.service(scope)
            .default_service(web::to(RedirectService::handle_no_route));
    }
}
