//! `ServeOptions` → `serve` argument list.
//!
//! Flags are emitted in a fixed order, each only when its field is set and
//! truthy (non-zero, non-empty, `true`). The target directory is always the
//! last argument. Values are not validated; `serve` reports bad input itself.
//!
//! | field                      | flag(s)                  |
//! |----------------------------|--------------------------|
//! | `port`                     | `--port <value>`         |
//! | `loglevel`                 | `--loglevel <value>`     |
//! | `redirect`                 | `--redirect <value>`     |
//! | `hmr.watch`                | `--watch`                |
//! | `hmr.auto_reload`          | `--auto-reload`          |
//! | `cache_headers.max_age`    | `--maxage <value>`       |
//! | `cache_headers.nocache`    | `--nocache`              |
//! | `cache_headers.no_etag`    | `--noetag`               |
//! | `server_cache.max`         | `--cache:max <value>`    |
//! | `server_cache.f_limit`     | `--cache:flimit <value>` |

use std::ffi::{OsStr, OsString};

use super::options::ServeOptions;

/// Build the argument list for `serve`, directory last.
pub fn build_args(options: &ServeOptions, dir: impl AsRef<OsStr>) -> Vec<OsString> {
    let mut args = ArgList::default();

    args.value("--port", options.port.filter(|&p| p != 0));
    args.value("--loglevel", options.loglevel);
    args.value("--redirect", options.redirect.as_deref().filter(|r| !r.is_empty()));

    if let Some(hmr) = &options.hmr {
        args.flag("--watch", hmr.watch);
        args.flag("--auto-reload", hmr.auto_reload);
    }

    if let Some(headers) = &options.cache_headers {
        args.value("--maxage", headers.max_age.filter(|&s| s != 0));
        args.flag("--nocache", headers.nocache);
        args.flag("--noetag", headers.no_etag);
    }

    if let Some(cache) = &options.server_cache {
        args.value("--cache:max", cache.max.filter(|&m| m != 0));
        args.value("--cache:flimit", cache.f_limit.filter(|&m| m != 0));
    }

    let mut args = args.0;
    args.push(dir.as_ref().to_owned());
    args
}

#[derive(Default)]
struct ArgList(Vec<OsString>);

impl ArgList {
    fn flag(&mut self, name: &str, enabled: Option<bool>) {
        if enabled == Some(true) {
            self.0.push(name.into());
        }
    }

    fn value(&mut self, name: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.0.push(name.into());
            self.0.push(value.to_string().into());
        }
    }
}
