//! HTML pages: the landing page and the per-session transcript with its
//! sidebar. Templates live in `templates/` and are compiled into the binary.

use crate::agents::{self, AgentProfile};
use crate::assets;
use crate::logs::{LogEntry, Role};
use crate::quotes::AgentQuote;
use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use serde::Serialize;

pub const SITE_TITLE: &str = "Texts with the Machine";

const LONG_DATE_FORMAT: &str = "%b %-d, %Y %-I:%M %p";
const SHORT_DATE_FORMAT: &str = "%m/%d";

/// URL schemes allowed in Markdown links and images
const SAFE_URL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

#[derive(Debug, Serialize)]
struct AgentCard<'a> {
    name: &'a str,
    personality: &'a str,
    description: &'a str,
    model_name: &'a str,
    image_url: String,
}

#[derive(Debug, Serialize)]
struct QuoteView<'a> {
    text: &'a str,
    agent_name: &'a str,
    url: String,
}

#[derive(Debug, Serialize)]
struct SessionHeader<'a> {
    agent_name: &'a str,
    model_name: &'a str,
    date: String,
    personality: Option<&'a str>,
    communication_style: Option<&'a str>,
    description: Option<&'a str>,
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageView {
    is_user: bool,
    /// Set for image messages
    image_url: Option<String>,
    /// Rendered Markdown for text messages
    html: String,
}

#[derive(Debug, Serialize)]
struct SidebarItem<'a> {
    url: String,
    agent_name: &'a str,
    short_date: String,
    preview: &'a str,
    model_name: &'a str,
    active: bool,
}

#[derive(Debug, Serialize)]
struct SidebarView<'a> {
    items: Vec<SidebarItem<'a>>,
    searchable: bool,
    query: &'a str,
    action: String,
}

/// Options for the landing page
#[derive(Debug, Default)]
pub struct HomeOptions<'a> {
    pub quote: Option<&'a AgentQuote>,
    /// Link for "Another Quote"; hidden when `None`
    pub another_quote_url: Option<String>,
}

/// Options for the session sidebar
#[derive(Debug, Default)]
pub struct SidebarOptions<'a> {
    /// Show the search box (requires a server to answer `?q=`)
    pub searchable: bool,
    pub query: &'a str,
}

pub struct Renderer {
    env: Environment<'static>,
    base: String,
}

impl Renderer {
    pub fn new(base: &str) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("base.html", include_str!("../templates/base.html"))?;
        env.add_template("home.html", include_str!("../templates/home.html"))?;
        env.add_template("session.html", include_str!("../templates/session.html"))?;
        Ok(Self { env, base: base.to_string() })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `logs` must be newest first; the first one is linked as the latest session.
    pub fn render_home(
        &self,
        logs: &[LogEntry],
        agents: &[AgentProfile],
        options: HomeOptions<'_>,
    ) -> Result<String, minijinja::Error> {
        let cards: Vec<AgentCard> = agents
            .iter()
            .map(|a| AgentCard {
                name: &a.name,
                personality: &a.personality,
                description: &a.description,
                model_name: &a.model_name,
                image_url: assets::agent_image_url(&self.base, &a.image),
            })
            .collect();

        let quote = options.quote.map(|q| QuoteView {
            text: &q.quote,
            agent_name: &q.agent_name,
            url: assets::session_url(&self.base, &q.session_id),
        });

        let latest_url = logs.first().map(|l| assets::session_url(&self.base, &l.id));

        self.env.get_template("home.html")?.render(context! {
            site_title => SITE_TITLE,
            agents => cards,
            quote => quote,
            latest_url => latest_url,
            another_quote_url => options.another_quote_url,
        })
    }

    /// Transcript for `log`; `sidebar_logs` is the (possibly filtered) list
    /// shown beside it.
    pub fn render_session(
        &self,
        log: &LogEntry,
        sidebar_logs: &[&LogEntry],
        agents: &[AgentProfile],
        sidebar: SidebarOptions<'_>,
    ) -> Result<String, minijinja::Error> {
        let agent = agents::find_agent(agents, &log.agent_name);
        let image_url = agent.map(|a| assets::agent_image_url(&self.base, &a.image));

        let header = SessionHeader {
            agent_name: &log.agent_name,
            model_name: &log.model_name,
            date: format_timestamp(log.timestamp, LONG_DATE_FORMAT),
            personality: log.personality.as_deref(),
            communication_style: log.communication_style.as_deref(),
            description: agent.map(|a| a.description.as_str()).filter(|d| !d.is_empty()),
            image_url,
        };

        let messages: Vec<MessageView> = log
            .messages
            .iter()
            .map(|m| MessageView {
                is_user: m.role == Role::User,
                image_url: m.src.as_deref().map(|src| assets::message_src_url(&self.base, src)),
                html: m.content.as_deref().map(markdown_to_html).unwrap_or_default(),
            })
            .collect();

        let items: Vec<SidebarItem> = sidebar_logs
            .iter()
            .map(|l| SidebarItem {
                url: assets::session_url(&self.base, &l.id),
                agent_name: &l.agent_name,
                short_date: format_timestamp(l.timestamp, SHORT_DATE_FORMAT),
                preview: l.display_preview(),
                model_name: &l.model_name,
                active: l.id == log.id,
            })
            .collect();

        let sidebar = SidebarView {
            items,
            searchable: sidebar.searchable,
            query: sidebar.query,
            action: assets::session_url(&self.base, &log.id),
        };

        self.env.get_template("session.html")?.render(context! {
            site_title => SITE_TITLE,
            home_url => assets::home_url(&self.base),
            header => header,
            messages => messages,
            sidebar => sidebar,
        })
    }
}

/// Epoch milliseconds in UTC; empty for out-of-range values.
pub fn format_timestamp(millis: i64, format: &str) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_default()
}

/// GitHub-flavored Markdown to HTML. Raw HTML in the source is escaped and
/// link or image destinations with other schemes than http(s) and mailto
/// are emptied.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Keep relative, fragment and allow-listed absolute URLs; anything else
/// becomes an empty destination.
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    // Browsers ignore whitespace and control characters inside the scheme
    let cleaned: String = url.chars().filter(|c| !c.is_ascii_whitespace() && !c.is_control()).collect();
    let allowed = match cleaned.find([':', '/', '?', '#']) {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            SAFE_URL_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    };
    if allowed {
        url
    } else {
        CowStr::Borrowed("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::ChatMessage;

    fn log(id: &str, agent: &str, ts: i64) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            request_id: "r".to_string(),
            timestamp: ts,
            model_name: "gemma-2".to_string(),
            agent_name: agent.to_string(),
            personality: Some("whimsical".to_string()),
            communication_style: Some("playful".to_string()),
            preview_text: None,
            messages: vec![
                ChatMessage {
                    role: Role::User,
                    content: Some("**hello** <script>alert(1)</script>".to_string()),
                    agent_name: None,
                    src: None,
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: Some("hi there".to_string()),
                    agent_name: None,
                    src: None,
                },
                ChatMessage {
                    role: Role::User,
                    content: None,
                    agent_name: None,
                    src: Some("./uploads/cat.png".to_string()),
                },
            ],
        }
    }

    /// The HTML escaper may encode `/` in attribute values
    fn unescape_slashes(page: String) -> String {
        page.replace("&#x2f;", "/")
    }

    fn agent(name: &str) -> AgentProfile {
        AgentProfile {
            name: name.to_string(),
            personality: "whimsical".to_string(),
            model_name: "gemma-2".to_string(),
            description: "Loves riddles".to_string(),
            image: "agents/gemma.png".to_string(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        // 2025-02-07T00:00:00Z
        assert_eq!(format_timestamp(1738886400000, LONG_DATE_FORMAT), "Feb 7, 2025 12:00 AM");
        assert_eq!(format_timestamp(1738886400000, SHORT_DATE_FORMAT), "02/07");
    }

    #[test]
    fn test_markdown_escapes_raw_html() {
        let html = markdown_to_html("**bold** <b>raw</b>\n\n| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("&lt;b&gt;raw&lt;/b&gt;"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_markdown_strips_script_urls() {
        let html = markdown_to_html("[click](javascript:alert(document.cookie))");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("<a href=\"\">click</a>"));

        let html = markdown_to_html(
            "![x](data:image/svg+xml;base64,PHN2Zz4=) <vbscript:msgbox(1)> [y](JaVaScRiPt:alert(1))",
        );
        assert!(html.contains("<img src=\"\" alt=\"x\""));
        assert!(!html.contains("src=\"data:"));
        assert!(!html.to_lowercase().contains("href=\"vbscript:"));
        assert!(!html.to_lowercase().contains("href=\"javascript:"));
    }

    #[test]
    fn test_markdown_keeps_safe_urls() {
        let html = markdown_to_html(
            "[a](https://example.com/x?y=1) [b](mailto:me@example.com) [c](/session/s1) [d](#top) [e](notes/a:b)",
        );
        assert!(html.contains("href=\"https://example.com/x?y=1\""));
        assert!(html.contains("href=\"mailto:me@example.com\""));
        assert!(html.contains("href=\"/session/s1\""));
        assert!(html.contains("href=\"#top\""));
        assert!(html.contains("href=\"notes/a:b\""));
    }

    #[test]
    fn test_home_page() {
        let renderer = Renderer::new("/site").unwrap();
        let logs = vec![log("newest", "Gemma", 2), log("older", "Gemma", 1)];
        let quote = AgentQuote {
            quote: "Riddles are doors".to_string(),
            session_id: "older".to_string(),
            agent_name: "Gemma".to_string(),
        };

        let page = renderer
            .render_home(
                &logs,
                &[agent("Gemma")],
                HomeOptions { quote: Some(&quote), another_quote_url: Some("/site/?quote=0".into()) },
            )
            .map(unescape_slashes)
            .unwrap();

        assert!(page.contains(SITE_TITLE));
        assert!(page.contains("/site/agents/gemma.png"));
        assert!(page.contains("Riddles are doors"));
        assert!(page.contains("href=\"/site/session/older\""));
        assert!(page.contains("href=\"/site/session/newest\""));
        assert!(page.contains("Another Quote"));
        assert!(!page.contains("No chat logs found"));
    }

    #[test]
    fn test_home_page_empty() {
        let renderer = Renderer::new("").unwrap();
        let page = renderer.render_home(&[], &[], HomeOptions::default()).unwrap();
        assert!(page.contains("No chat logs found"));
        assert!(!page.contains("Another Quote"));
        assert!(!page.contains("Meet the Personalities"));
    }

    #[test]
    fn test_session_page() {
        let renderer = Renderer::new("/site").unwrap();
        let current = log("s1", "Gemma", 1738886400000);
        let other = log("s2", "Mira", 1738886400000);
        let sidebar = vec![&current, &other];

        let page = renderer
            .render_session(&current, &sidebar, &[agent("Gemma")], SidebarOptions::default())
            .map(unescape_slashes)
            .unwrap();

        assert!(page.contains("Feb 7, 2025 12:00 AM"));
        assert!(page.contains("Loves riddles"));
        assert!(page.contains("whimsical"));
        assert!(page.contains("playful"));
        assert!(page.contains("<strong>hello</strong>"));
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("/site/uploads/cat.png"));
        assert!(page.contains("/site/agents/gemma.png"));
        assert!(page.contains("session-item active"));
        assert!(page.contains("/site/session/s2"));
        assert!(!page.contains("Search sessions..."));
    }

    #[test]
    fn test_session_page_without_profile_or_results() {
        let renderer = Renderer::new("").unwrap();
        let current = log("s1", "Stranger", 0);

        let page = renderer
            .render_session(&current, &[], &[agent("Gemma")], SidebarOptions { searchable: true, query: "zzz" })
            .map(unescape_slashes)
            .unwrap();

        assert!(!page.contains("agents/gemma.png"));
        assert!(page.contains("No sessions found."));
        assert!(page.contains("Search sessions..."));
        assert!(page.contains("value=\"zzz\""));
    }
}
