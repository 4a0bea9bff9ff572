// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashMap;

use mcp_sandbox_core::infrastructure::docker_spec::{
    expand_allowed_directories, parse_docker_style_command, substitute_template,
};

/// A `docker run` passthrough command carrying a value-less `-e` flag, with
/// the actual secret supplied later from an OAuth-derived environment map
/// (mirrors how an installer persists a third-party MCP's launch command).
#[test]
fn docker_passthrough_command_derives_image_and_accepts_late_bound_env() {
    let args: Vec<String> = [
        "run", "--rm", "-i", "-e", "LINKEDIN_COOKIE",
        "stickerdaniel/linkedin-mcp-server:latest",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut parts = parse_docker_style_command(&args).expect("well-formed docker command parses");
    assert_eq!(parts.image, "stickerdaniel/linkedin-mcp-server:latest");
    assert!(parts.command.is_none());
    assert_eq!(parts.args, Vec::<String>::new());

    // OAuth-derived env fills in the value for the bare `-e LINKEDIN_COOKIE` flag.
    parts.env.insert("LINKEDIN_COOKIE".to_string(), "xyz".to_string());
    assert_eq!(parts.env.get("LINKEDIN_COOKIE"), Some(&"xyz".to_string()));
}

/// `${allowed_directories}` expands against the configured mount root, and
/// `${user_config.*}` / `${access_token}` substitution composes cleanly with
/// it in whatever order a server config lists its args.
#[test]
fn allowed_directories_and_template_substitution_compose() {
    let mut user_config = HashMap::new();
    user_config.insert("workspace".to_string(), serde_json::json!("/home/me/project"));

    let args = vec![
        "--workspace".to_string(),
        "${user_config.workspace}".to_string(),
        "${allowed_directories}".to_string(),
    ];

    let substituted: Vec<String> = args
        .iter()
        .map(|a| substitute_template(a, &user_config, Some("tok-abc")))
        .collect();

    let host_dirs = vec!["/home/me/project".to_string(), "/home/me/notes".to_string()];
    let expanded = expand_allowed_directories(&substituted, &host_dirs, "/mnt/archestra", |s| s.replace(' ', "_"));

    assert_eq!(
        expanded,
        vec![
            "--workspace".to_string(),
            "/home/me/project".to_string(),
            "/mnt/archestra/project".to_string(),
            "/mnt/archestra/notes".to_string(),
        ]
    );
}

/// A non-docker command (direct in-container entrypoint) leaves `env` empty
/// from parsing; nothing downstream should assume `-e` flags are present.
#[test]
fn non_docker_invocation_has_no_parsed_env() {
    let args: Vec<String> = vec!["-m".to_string(), "my_server".to_string()];
    // `-m` is not `run`, a bare flag, or `-e`, so it is treated as the image
    // token itself — this function only ever sees the args *after* a
    // recognized `docker`/`podman` command, never a bare entrypoint list.
    let parts = parse_docker_style_command(&args).expect("parser is total on any non-empty token list with an image-shaped token");
    assert_eq!(parts.image, "-m");
    assert_eq!(parts.command.as_deref(), Some("my_server"));
    assert!(parts.env.is_empty());
}
