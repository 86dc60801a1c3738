//! 出站邮件改写
//!
//! 发送前把邮件 HTML 改写为可追踪版本：
//! - `track_opens`：在 `</body>` 前插入 1×1 追踪像素
//! - `track_clicks`：把每个非豁免链接改写为经过重定向端点的 URL
//!
//! 每个像素和每个改写的链接都有独立的 tracking_id，改写只产生
//! 待入库的 [`NewTrackingReference`]，不直接写任何计数。
//!
//! 只有绝对 http(s) 链接会被追踪：`mailto:`、页内锚点、相对路径
//! 以及其他 scheme 一律豁免，原样保留。

pub mod html;

use uuid::Uuid;

use self::html::{insert_before_body_end, rewrite_anchor_hrefs};

/// 追踪引用的种类，决定命中时产生的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Pixel,
    Link,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Pixel => "pixel",
            ReferenceKind::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pixel" => Some(ReferenceKind::Pixel),
            "link" => Some(ReferenceKind::Link),
            _ => None,
        }
    }
}

/// 一次发送的改写上下文
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub campaign_id: String,
    pub recipient_id: String,
    pub track_opens: bool,
    pub track_clicks: bool,
}

/// 待持久化的追踪引用
#[derive(Debug, Clone)]
pub struct NewTrackingReference {
    pub tracking_id: String,
    pub campaign_id: String,
    pub recipient_id: String,
    pub kind: ReferenceKind,
    pub target_url: Option<String>,
}

/// 改写结果
///
/// `references` 必须在邮件实际发出前全部入库，否则命中无法解析。
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub html: String,
    /// 本次发送的主 tracking_id（像素引用使用的 id）
    pub tracking_id: String,
    pub references: Vec<NewTrackingReference>,
}

pub struct Rewriter {
    public_base_url: String,
}

impl Rewriter {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        let mut base = public_base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            public_base_url: base,
        }
    }

    /// 产出可追踪的邮件 HTML
    ///
    /// 每次调用生成全新的一组 tracking_id，互不影响；
    /// 同一收件人重发会得到独立的追踪引用。
    pub fn rewrite(&self, html_body: &str, ctx: &RewriteContext) -> RewriteOutcome {
        let mut references = Vec::new();
        let tracking_id = new_tracking_id();

        let mut output = if ctx.track_clicks {
            rewrite_anchor_hrefs(html_body, |href| {
                if self.is_exempt(href) {
                    return None;
                }
                let link_id = new_tracking_id();
                let rewritten = self.redirect_url(&link_id, href);
                references.push(NewTrackingReference {
                    tracking_id: link_id,
                    campaign_id: ctx.campaign_id.clone(),
                    recipient_id: ctx.recipient_id.clone(),
                    kind: ReferenceKind::Link,
                    target_url: Some(href.to_string()),
                });
                Some(rewritten)
            })
        } else {
            html_body.to_string()
        };

        if ctx.track_opens {
            let pixel = format!(
                r#"<img src="{}" width="1" height="1" style="display:none;max-height:0;border:0;" alt="">"#,
                self.pixel_url(&tracking_id, ctx)
            );
            output = insert_before_body_end(&output, &pixel);
            references.push(NewTrackingReference {
                tracking_id: tracking_id.clone(),
                campaign_id: ctx.campaign_id.clone(),
                recipient_id: ctx.recipient_id.clone(),
                kind: ReferenceKind::Pixel,
                target_url: None,
            });
        }

        RewriteOutcome {
            html: output,
            tracking_id,
            references,
        }
    }

    fn pixel_url(&self, tracking_id: &str, ctx: &RewriteContext) -> String {
        format!(
            "{}/t/open.gif?id={}&campaign={}&contact={}",
            self.public_base_url,
            tracking_id,
            urlencoding::encode(&ctx.campaign_id),
            urlencoding::encode(&ctx.recipient_id)
        )
    }

    fn redirect_url(&self, tracking_id: &str, target: &str) -> String {
        format!(
            "{}/t/click?id={}&url={}",
            self.public_base_url,
            tracking_id,
            urlencoding::encode(target)
        )
    }

    /// 豁免规则：锚点、mailto/tel 等非网页协议、相对路径、已改写的链接
    fn is_exempt(&self, href: &str) -> bool {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return true;
        }
        if href.starts_with(&self.public_base_url) {
            return true;
        }
        let lower = href.to_ascii_lowercase();
        // 只改写绝对的 http(s) 链接
        !(lower.starts_with("http://") || lower.starts_with("https://"))
    }
}

fn new_tracking_id() -> String {
    Uuid::new_v4().simple().to_string()
}
