//! Per-platform descriptors.
//!
//! Every supported chat service differs only in its fence tag, its thread URL
//! grammar, and the URLs used when no thread is selected. The lifecycle engine
//! in `session` is generic over these descriptors.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::classify;
use crate::error::ChatblockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Chatgpt,
    Claude,
    Gemini,
    Deepseek,
    Perplexity,
    Grok,
    Aistudio,
    Kimi,
    Openwebui,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Chatgpt,
        Platform::Claude,
        Platform::Gemini,
        Platform::Deepseek,
        Platform::Perplexity,
        Platform::Grok,
        Platform::Aistudio,
        Platform::Kimi,
        Platform::Openwebui,
    ];

    pub fn descriptor(self) -> &'static PlatformDescriptor {
        PLATFORMS
            .iter()
            .find(|d| d.platform == self)
            .unwrap_or(&PLATFORMS[0])
    }

    /// Look up a platform by its fence tag (e.g. `smart-claude`).
    pub fn from_fence_tag(tag: &str) -> Option<Platform> {
        let tag = tag.trim();
        PLATFORMS
            .iter()
            .find(|d| d.fence_tag == tag)
            .map(|d| d.platform)
    }

    pub fn fence_tag(self) -> &'static str {
        self.descriptor().fence_tag
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chatgpt => write!(f, "chatgpt"),
            Self::Claude => write!(f, "claude"),
            Self::Gemini => write!(f, "gemini"),
            Self::Deepseek => write!(f, "deepseek"),
            Self::Perplexity => write!(f, "perplexity"),
            Self::Grok => write!(f, "grok"),
            Self::Aistudio => write!(f, "aistudio"),
            Self::Kimi => write!(f, "kimi"),
            Self::Openwebui => write!(f, "openwebui"),
        }
    }
}

impl FromStr for Platform {
    type Err = ChatblockError;

    /// Accepts both the short name (`claude`) and the fence tag (`smart-claude`).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lower = input.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("smart-").unwrap_or(&lower);
        Platform::ALL
            .into_iter()
            .find(|p| p.to_string() == name)
            .ok_or_else(|| ChatblockError::UnknownPlatform(input.to_string()))
    }
}

/// Static description of one chat service.
#[derive(Debug)]
pub struct PlatformDescriptor {
    pub platform: Platform,
    pub fence_tag: &'static str,
    pub label: &'static str,
    /// Hostnames that identify this service in arbitrary URLs
    pub hosts: &'static [&'static str],
    /// Target of the "New chat" entry and of navigation after the last thread is done
    pub fallback_url: &'static str,
    /// Preferred start page when a block has no unfinished thread
    pub home_url: Option<&'static str>,
    /// Quiet period before a navigation is treated as settled
    pub debounce: Duration,
    /// Navigations into these prefixes are embedded frames, not page changes
    pub ignored_url_prefixes: &'static [&'static str],
    /// Extra "new ..." dropdown entries as (label, url)
    pub extra_options: &'static [(&'static str, &'static str)],
    pub is_thread_link: fn(&str) -> bool,
}

impl PlatformDescriptor {
    pub fn is_ignored_url(&self, url: &str) -> bool {
        self.ignored_url_prefixes.iter().any(|p| url.starts_with(p))
    }
}

const BASE_DEBOUNCE: Duration = Duration::from_millis(300);
const SLOW_DEBOUNCE: Duration = Duration::from_millis(2000);

pub static PLATFORMS: [PlatformDescriptor; 9] = [
    PlatformDescriptor {
        platform: Platform::Chatgpt,
        fence_tag: "smart-chatgpt",
        label: "ChatGPT",
        hosts: &[
            "chatgpt.com",
            "chat.openai.com",
            "sora.com",
            "sora.chatgpt.com",
            "operator.chatgpt.com",
        ],
        fallback_url: "https://chatgpt.com",
        home_url: None,
        debounce: BASE_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[
            ("New Codex", "https://chatgpt.com/codex"),
            ("New Sora", "https://sora.chatgpt.com/drafts"),
        ],
        is_thread_link: classify::is_chatgpt_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Claude,
        fence_tag: "smart-claude",
        label: "Claude",
        hosts: &["claude.ai"],
        fallback_url: "https://claude.ai/chat/new",
        home_url: None,
        debounce: SLOW_DEBOUNCE,
        ignored_url_prefixes: &["https://www.claudeusercontent.com/"],
        extra_options: &[],
        is_thread_link: classify::is_claude_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Gemini,
        fence_tag: "smart-gemini",
        label: "Gemini",
        hosts: &["gemini.google.com"],
        fallback_url: "https://gemini.google.com/app",
        home_url: None,
        debounce: SLOW_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_gemini_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Deepseek,
        fence_tag: "smart-deepseek",
        label: "DeepSeek",
        hosts: &["chat.deepseek.com"],
        fallback_url: "https://chat.deepseek.com/",
        home_url: None,
        debounce: SLOW_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_deepseek_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Perplexity,
        fence_tag: "smart-perplexity",
        label: "Perplexity",
        hosts: &["perplexity.ai", "www.perplexity.ai"],
        fallback_url: "https://www.perplexity.ai/",
        home_url: None,
        debounce: BASE_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_perplexity_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Grok,
        fence_tag: "smart-grok",
        label: "Grok",
        hosts: &["grok.com", "www.grok.com"],
        fallback_url: "https://grok.com/chat",
        home_url: None,
        debounce: SLOW_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_grok_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Aistudio,
        fence_tag: "smart-aistudio",
        label: "AI Studio",
        hosts: &["aistudio.google.com"],
        fallback_url: "https://aistudio.google.com/prompts/new_chat",
        home_url: None,
        debounce: BASE_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_aistudio_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Kimi,
        fence_tag: "smart-kimi",
        label: "Kimi",
        hosts: &["kimi.com", "www.kimi.com"],
        fallback_url: "https://www.kimi.com/",
        home_url: None,
        debounce: BASE_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_kimi_thread_link,
    },
    PlatformDescriptor {
        platform: Platform::Openwebui,
        fence_tag: "smart-openwebui",
        label: "Open WebUI",
        // Self-hosted; never detected by hostname
        hosts: &[],
        fallback_url: "http://localhost:3000/",
        home_url: None,
        debounce: BASE_DEBOUNCE,
        ignored_url_prefixes: &[],
        extra_options: &[],
        is_thread_link: classify::is_openwebui_thread_link,
    },
];

/// Detect the platform of an arbitrary URL by hostname.
pub fn platform_for_url(url: &str) -> Option<Platform> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    PLATFORMS
        .iter()
        .find(|d| d.hosts.contains(&host))
        .map(|d| d.platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_platform_has_a_descriptor() {
        for platform in Platform::ALL {
            let d = platform.descriptor();
            assert_eq!(d.platform, platform);
            assert_eq!(d.fence_tag, format!("smart-{}", platform));
        }
    }

    #[test]
    fn test_from_fence_tag() {
        let cases = vec![
            ("smart-chatgpt", Some(Platform::Chatgpt)),
            ("smart-openwebui", Some(Platform::Openwebui)),
            (" smart-kimi ", Some(Platform::Kimi)),
            ("smart-chat", None),
            ("python", None),
        ];
        for (tag, want) in cases {
            let got = Platform::from_fence_tag(tag);
            assert_eq!(got, want, "from_fence_tag({:?}) = {:?}, want {:?}", tag, got, want);
        }
    }

    #[test]
    fn test_from_str_accepts_name_and_tag() {
        assert_eq!("claude".parse::<Platform>().unwrap(), Platform::Claude);
        assert_eq!("smart-grok".parse::<Platform>().unwrap(), Platform::Grok);
        assert_eq!("AIStudio".parse::<Platform>().unwrap(), Platform::Aistudio);
        let err = "cursor".parse::<Platform>().unwrap_err();
        assert!(err.to_string().contains("unknown platform"));
    }

    #[test]
    fn test_platform_for_url() {
        let cases = vec![
            ("https://chatgpt.com/c/123", Some(Platform::Chatgpt)),
            ("https://chat.openai.com/c/123", Some(Platform::Chatgpt)),
            ("https://claude.ai/chat/abc", Some(Platform::Claude)),
            ("https://www.grok.com/c/abc", Some(Platform::Grok)),
            ("https://example.com/", None),
            ("not a url", None),
        ];
        for (url, want) in cases {
            let got = platform_for_url(url);
            assert_eq!(got, want, "platform_for_url({:?}) = {:?}, want {:?}", url, got, want);
        }
    }

    #[test]
    fn test_fallback_is_never_a_thread() {
        for d in PLATFORMS.iter() {
            assert!(
                !(d.is_thread_link)(d.fallback_url),
                "{} fallback {} classifies as a thread",
                d.platform,
                d.fallback_url
            );
        }
    }

    #[test]
    fn test_claude_ignores_artifact_frames() {
        let d = Platform::Claude.descriptor();
        assert!(d.is_ignored_url("https://www.claudeusercontent.com/frame"));
        assert!(!d.is_ignored_url("https://claude.ai/chat/abc"));
    }
}
