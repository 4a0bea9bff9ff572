// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pure functions behind container spec derivation: the docker/podman
//! argument parser and the `${user_config.KEY}` / `${access_token}`
//! template substitution engine. Kept free of any bollard or I/O
//! dependency so they can be unit tested in isolation.

use std::collections::HashMap;
use serde_json::Value;

/// Parsed shape of a `docker run ...`/`podman run ...` style server-config
/// command, round-trippable back into image/command/args/env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCommandParts {
    pub image: String,
    /// Entrypoint override, if any token follows the image in `args`.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Recognized flags that precede the image token and carry no value of
/// their own.
fn is_bare_flag(token: &str) -> bool {
    matches!(
        token,
        "run" | "--rm" | "-i" | "-t" | "-it" | "--tty" | "--interactive"
    )
}

/// Parse a `docker`/`podman`-style argument list into `(image, command, args, env)`.
///
/// Walks the list skipping `run` and the bare flags above, collecting `-e
/// KEY[=VAL]` pairs into `env` (value-less `-e KEY` entries are recorded
/// with an empty string value here; the caller fills them from OAuth-derived
/// env before substitution). The first token that is not a recognized flag
/// and does not follow `-e` is the image; everything after it becomes the
/// entrypoint override (`command` = first remaining token, `args` = the
/// rest).
pub fn parse_docker_style_command(args: &[String]) -> Option<DockerCommandParts> {
    let mut env = HashMap::new();
    let mut image: Option<String> = None;
    let mut rest: Vec<String> = Vec::new();

    let mut iter = args.iter().peekable();
    while let Some(token) = iter.next() {
        if image.is_some() {
            rest.push(token.clone());
            continue;
        }

        if is_bare_flag(token) {
            continue;
        }

        if token == "-e" {
            if let Some(kv) = iter.next() {
                insert_env_pair(&mut env, kv);
            }
            continue;
        }
        if let Some(kv) = token.strip_prefix("-e") {
            if !kv.is_empty() {
                insert_env_pair(&mut env, kv);
                continue;
            }
        }

        // First non-flag, non -e-value token is the image.
        image = Some(token.clone());
    }

    let image = image?;
    let command = rest.first().cloned();
    let trailing_args = if rest.is_empty() { Vec::new() } else { rest[1..].to_vec() };

    Some(DockerCommandParts {
        image,
        command,
        args: trailing_args,
        env,
    })
}

fn insert_env_pair(env: &mut HashMap<String, String>, kv: &str) {
    match kv.split_once('=') {
        Some((k, v)) => {
            env.insert(k.to_string(), v.to_string());
        }
        None => {
            env.insert(kv.to_string(), String::new());
        }
    }
}

/// Replace `${user_config.KEY}` occurrences with the corresponding user
/// value (arrays joined by comma), and `${access_token}` with the current
/// OAuth access token if present. Idempotent: a string containing no
/// further `${...}` markers is returned unchanged on a second pass.
pub fn substitute_template(
    input: &str,
    user_config: &HashMap<String, Value>,
    access_token: Option<&str>,
) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start..].find('}') else {
            output.push_str(rest);
            rest = "";
            break;
        };
        let end = start + end_rel;
        output.push_str(&rest[..start]);

        let key = &rest[start + 2..end];
        if key == "access_token" {
            output.push_str(access_token.unwrap_or(""));
        } else if let Some(user_key) = key.strip_prefix("user_config.") {
            output.push_str(&render_user_value(user_config.get(user_key)));
        } else {
            // Unknown placeholder: leave verbatim so unrelated `${...}` text
            // (e.g. shell-style variables the MCP itself interprets) survives.
            output.push_str(&rest[start..=end]);
        }

        rest = &rest[end + 1..];
    }
    output.push_str(rest);
    output
}

fn render_user_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(render_user_value_borrowed)
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn render_user_value_borrowed(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Expand a standalone `allowed_directories` arg into one arg per configured
/// directory, mapped to its in-container mount path.
pub fn expand_allowed_directories(
    args: &[String],
    host_directories: &[String],
    mount_root: &str,
    sanitize: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len());
    for arg in args {
        if arg == "${allowed_directories}" {
            for dir in host_directories {
                let basename = std::path::Path::new(dir)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(dir);
                expanded.push(format!("{mount_root}/{}", sanitize(basename)));
            }
        } else {
            expanded.push(arg.clone());
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_linkedin_style_command() {
        let args: Vec<String> = [
            "run", "--rm", "-i", "-e", "LINKEDIN_COOKIE",
            "stickerdaniel/linkedin-mcp-server:latest",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let parts = parse_docker_style_command(&args).unwrap();
        assert_eq!(parts.image, "stickerdaniel/linkedin-mcp-server:latest");
        assert!(parts.command.is_none());
        assert!(parts.env.contains_key("LINKEDIN_COOKIE"));
    }

    #[test]
    fn round_trip_law_image_env_args() {
        let args: Vec<String> = [
            "run", "-e", "FOO=bar", "-i", "my/image:tag", "entrypoint-override", "arg1", "arg2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let parts = parse_docker_style_command(&args).unwrap();
        assert_eq!(parts.image, "my/image:tag");
        assert_eq!(parts.command.as_deref(), Some("entrypoint-override"));
        assert_eq!(parts.args, vec!["arg1".to_string(), "arg2".to_string()]);
        assert_eq!(parts.env.get("FOO"), Some(&"bar".to_string()));
    }

    #[test]
    fn template_substitution_replaces_user_config_key() {
        let mut user_config = HashMap::new();
        user_config.insert("workspace".to_string(), json!("/home/me/project"));
        let out = substitute_template("--dir=${user_config.workspace}", &user_config, None);
        assert_eq!(out, "--dir=/home/me/project");
    }

    #[test]
    fn template_substitution_joins_arrays_with_comma() {
        let mut user_config = HashMap::new();
        user_config.insert("tags".to_string(), json!(["a", "b", "c"]));
        let out = substitute_template("${user_config.tags}", &user_config, None);
        assert_eq!(out, "a,b,c");
    }

    #[test]
    fn template_substitution_is_idempotent() {
        let mut user_config = HashMap::new();
        user_config.insert("key".to_string(), json!("value"));
        let once = substitute_template("${user_config.key}", &user_config, None);
        let twice = substitute_template(&once, &user_config, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn access_token_substitution() {
        let user_config = HashMap::new();
        let out = substitute_template("Bearer ${access_token}", &user_config, Some("xyz123"));
        assert_eq!(out, "Bearer xyz123");
    }

    #[test]
    fn allowed_directories_expands_to_multiple_args() {
        let args = vec!["${allowed_directories}".to_string()];
        let dirs = vec!["/home/me/project".to_string(), "/home/me/notes".to_string()];
        let expanded = expand_allowed_directories(&args, &dirs, "/mnt/archestra", |s| s.to_string());
        assert_eq!(expanded, vec!["/mnt/archestra/project", "/mnt/archestra/notes"]);
    }
}
