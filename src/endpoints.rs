//! Declarative endpoint table and generic dispatch.
//!
//! Each API method is described by an [`Endpoint`]: its HTTP method, a path
//! template with `:name` placeholders (`:name?` for an optional trailing
//! segment), and the parameters that must be supplied. [`Client::call`]
//! resolves a descriptor into a [`LogicalRequest`] and runs it.

use crate::error::{Result, TumblrError};
use crate::request::{HttpMethod, LogicalRequest, Params};
use crate::rest::{CallArgs, Client, Dispatch};
use tracing::warn;

/// Description of one API method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub required: &'static [&'static str],
}

macro_rules! endpoints {
    ($($konst:ident => $name:literal, $method:ident, $path:literal, [$($req:literal),*];)*) => {
        $(pub const $konst: Endpoint = Endpoint {
            name: $name,
            method: HttpMethod::$method,
            path: $path,
            required: &[$($req),*],
        };)*

        /// Every known endpoint
        pub const ALL: &[Endpoint] = &[$($konst),*];
    };
}

endpoints! {
    BLOG_INFO => "blog_info", Get, "/v2/blog/:blogIdentifier/info", [];
    BLOG_AVATAR => "blog_avatar", Get, "/v2/blog/:blogIdentifier/avatar/:size?", [];
    BLOG_LIKES => "blog_likes", Get, "/v2/blog/:blogIdentifier/likes", [];
    BLOG_FOLLOWERS => "blog_followers", Get, "/v2/blog/:blogIdentifier/followers", [];
    BLOG_POSTS => "blog_posts", Get, "/v2/blog/:blogIdentifier/posts/:type?", [];
    BLOG_POST => "blog_post", Get, "/v2/blog/:blogIdentifier/posts/:postId", [];
    BLOG_QUEUE => "blog_queue", Get, "/v2/blog/:blogIdentifier/posts/queue", [];
    BLOG_DRAFTS => "blog_drafts", Get, "/v2/blog/:blogIdentifier/posts/draft", [];
    BLOG_SUBMISSIONS => "blog_submissions", Get, "/v2/blog/:blogIdentifier/posts/submission", [];
    BLOG_NOTES => "blog_notes", Get, "/v2/blog/:blogIdentifier/notes", ["id"];
    USER_INFO => "user_info", Get, "/v2/user/info", [];
    USER_DASHBOARD => "user_dashboard", Get, "/v2/user/dashboard", [];
    USER_LIKES => "user_likes", Get, "/v2/user/likes", [];
    USER_FOLLOWING => "user_following", Get, "/v2/user/following", [];
    FOLLOW_BLOG => "follow_blog", Post, "/v2/user/follow", ["url"];
    UNFOLLOW_BLOG => "unfollow_blog", Post, "/v2/user/unfollow", ["url"];
    LIKE_POST => "like_post", Post, "/v2/user/like", ["id", "reblog_key"];
    UNLIKE_POST => "unlike_post", Post, "/v2/user/unlike", ["id", "reblog_key"];
    TAGGED_POSTS => "tagged_posts", Get, "/v2/tagged", ["tag"];
    CREATE_POST => "create_post", Post, "/v2/blog/:blogIdentifier/posts", ["content"];
    EDIT_POST => "edit_post", Put, "/v2/blog/:blogIdentifier/posts/:postId", [];
    CREATE_LEGACY_POST => "create_legacy_post", Post, "/v2/blog/:blogIdentifier/post", ["type"];
    EDIT_LEGACY_POST => "edit_legacy_post", Post, "/v2/blog/:blogIdentifier/post/edit", ["id"];
    DELETE_POST => "delete_post", Post, "/v2/blog/:blogIdentifier/post/delete", ["id"];
    REBLOG_POST => "reblog_post", Post, "/v2/blog/:blogIdentifier/post/reblog", ["id", "reblog_key"];
}

impl Endpoint {
    /// Find an endpoint by name
    pub fn lookup(name: &str) -> Option<&'static Endpoint> {
        ALL.iter().find(|endpoint| endpoint.name == name)
    }

    /// Placeholder names in template order, with their optional flag
    pub fn placeholders(&self) -> Vec<(&'static str, bool)> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .map(|name| match name.strip_suffix('?') {
                Some(name) => (name, true),
                None => (name, false),
            })
            .collect()
    }

    /// Substitute `path_args` into the template, in placeholder order
    pub fn resolve_path(&self, path_args: &[&str]) -> Result<String> {
        let placeholders = self.placeholders();
        if path_args.len() > placeholders.len() {
            return Err(TumblrError::RequestBuild(format!(
                "{} takes at most {} path arguments, got {}",
                self.name,
                placeholders.len(),
                path_args.len()
            )));
        }

        let mut args = path_args.iter();
        let mut segments = Vec::new();
        for segment in self.path.split('/') {
            let Some(placeholder) = segment.strip_prefix(':') else {
                segments.push(segment.to_string());
                continue;
            };
            let (name, optional) = match placeholder.strip_suffix('?') {
                Some(name) => (name, true),
                None => (placeholder, false),
            };
            match args.next().filter(|arg| !arg.is_empty()) {
                Some(arg) if name == "blogIdentifier" => {
                    segments.push(urlencoding::encode(&blog_identifier(arg)).into_owned())
                }
                Some(arg) => segments.push(urlencoding::encode(arg).into_owned()),
                None if optional => {}
                None => {
                    return Err(TumblrError::RequestBuild(format!(
                        "{} requires path argument :{name}",
                        self.name
                    )))
                }
            }
        }
        Ok(segments.join("/"))
    }

    /// Check that all required parameters are present
    pub fn validate(&self, params: &Params) -> Result<()> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|field| !params.contains_key(*field))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TumblrError::RequestBuild(format!(
                "{} is missing required parameters: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    /// Turn this endpoint plus arguments into a logical request
    pub fn request(&self, path_args: &[&str], params: Params) -> Result<LogicalRequest> {
        self.validate(&params)?;
        Ok(LogicalRequest::new(self.method, self.resolve_path(path_args)?).with_params(params))
    }
}

/// Bare blog names get the default domain; hostnames and UUIDs pass through.
pub fn blog_identifier(blog: &str) -> String {
    if blog.contains('.') || blog.starts_with("t:") {
        blog.to_string()
    } else {
        format!("{blog}.tumblr.com")
    }
}

impl Client {
    /// Call a described endpoint.
    ///
    /// With a callback the callback receives the result and nothing is
    /// returned; otherwise a deferred value is returned. In promise mode a
    /// deferred value is always returned and any callback is dropped.
    pub fn call(&self, endpoint: &Endpoint, path_args: &[&str], args: CallArgs) -> Dispatch {
        let CallArgs { params, mut callback } = args;

        if self.promise_mode() && callback.take().is_some() {
            warn!(endpoint = endpoint.name, "promise mode is on; ignoring callback");
        }

        match endpoint.request(path_args, params) {
            Ok(request) => self.execute(request, callback),
            Err(e) => match callback {
                Some(callback) => {
                    callback(Err(e), None);
                    Dispatch::Callback
                }
                None => Dispatch::Deferred(Box::pin(async move { Err(e) })),
            },
        }
    }

    /// Call an endpoint by table name
    pub fn call_named(&self, name: &str, path_args: &[&str], args: CallArgs) -> Dispatch {
        match Endpoint::lookup(name) {
            Some(endpoint) => self.call(endpoint, path_args, args),
            None => {
                let e = TumblrError::RequestBuild(format!("unknown endpoint {name:?}"));
                match args.callback {
                    Some(callback) if !self.promise_mode() => {
                        callback(Err(e), None);
                        Dispatch::Callback
                    }
                    _ => Dispatch::Deferred(Box::pin(async move { Err(e) })),
                }
            }
        }
    }
}
