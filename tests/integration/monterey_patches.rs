//! Integration tests for the monterey-webkit patch set.
//!
//! Uses a mock node_modules with the regexes that fail to parse on Safari 15:
//! mdast-util-gfm-autolink-literal 2.x (email lookbehind) and marked 15.x
//! (backtick-run lookbehinds with named groups).

use regex_compat::config::{apply_targets, load_from_path, ApplyMode, PatchStatus};
use regex_compat::ConstructCounts;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PATCH_SET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/patches/monterey-webkit.toml");

const MDAST_INDEX: &str = r#"import {ccount} from 'ccount'
import {findAndReplace} from 'mdast-util-find-and-replace'

export function transformGfmAutolinkLiterals(tree) {
  findAndReplace(
    tree,
    [
      [/(https?:\/\/|www(?=\.))([-.\w]+)([^ \t\r\n]*)/gi, findUrl],
      [/(?<=^|\s|\p{P}|\p{S})([-.\w+]+)@([-\w]+(?:\.[-\w]+)+)/gu, findEmail]
    ],
    {ignore: ['link', 'linkReference']}
  )
}
"#;

const MARKED_ESM: &str = r##"const blockSkip = /\[[^[\]]*?\]\((?:\\.|[^\\\(\)]|\((?:\\.|[^\\\(\)])*\))*\)|`[^`]*?`|<[^<>]*?>/g;
const inlineLink = /\[(?:[^\[\]`]|(?<!`)(?<a>`+)[^`]+\k<a>(?!`))*?\]\((?:\\[\s\S]|[^\\()\)]|\((?:\\[\s\S]|[^\\()\)])*\))*\)/;
const codeSpan = /(?:[^`]|(?<!`)(?<b>`+)[^`]+\k<b>(?!`))+/g;
const heading = /^(?<hashes>#{1,6})\s/;
const emStrongRDelim = /(?<=\w)_/;
export { blockSkip, inlineLink, codeSpan, heading, emStrongRDelim };
"##;

const MARKED_UMD: &str = r##"(function (global, factory) {
  typeof exports === 'object' && typeof module !== 'undefined' ? factory(exports) :
  (global = global || self, factory(global.marked = {}));
})(this, (function (exports) { 'use strict';
  const inlineLink = /\[(?:[^\[\]`]|(?<!`)(?<a>`+)[^`]+\k<a>(?!`))*?\]\((?:\\[\s\S]|[^\\()\)]|\((?:\\[\s\S]|[^\\()\)])*\))*\)/;
  const codeSpan = /(?:[^`]|(?<!`)(?<b>`+)[^`]+\k<b>(?!`))+/g;
  const heading = new RegExp("^(?<hashes>#{1,6})\\s");
  exports.inlineLink = inlineLink;
}));
"##;

fn write_package(root: &Path, name: &str, version: &str, files: &[(&str, &str)]) {
    let dir = root.join("node_modules").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        format!(r#"{{ "name": "{name}", "version": "{version}" }}"#),
    )
    .unwrap();
    for (file, content) in files {
        let path = dir.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn setup_mock_workspace(mdast_version: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "notes-app" }"#).unwrap();
    write_package(
        dir.path(),
        "mdast-util-gfm-autolink-literal",
        mdast_version,
        &[("lib/index.js", MDAST_INDEX)],
    );
    write_package(
        dir.path(),
        "marked",
        "15.0.7",
        &[
            ("lib/marked.esm.js", MARKED_ESM),
            ("lib/marked.umd.js", MARKED_UMD),
        ],
    );
    dir
}

fn read(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join(file)).unwrap()
}

#[test]
fn test_patch_set_loads() {
    let set = load_from_path(PATCH_SET).unwrap();
    assert_eq!(set.meta.name, "monterey-webkit");
    let ids: Vec<_> = set.targets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "mdast-autolink-email",
            "marked-esm",
            "marked-umd",
            "vditor-highlight"
        ]
    );
    assert_eq!(set.enabled_targets().count(), 3);
}

#[test]
fn test_apply_all_targets() {
    let workspace = setup_mock_workspace("2.0.1");
    let root = workspace.path();
    let set = load_from_path(PATCH_SET).unwrap();

    let results = apply_targets(&set, root, ApplyMode::Write);
    assert_eq!(results.len(), 4);

    assert!(matches!(
        results[0].1,
        Ok(PatchStatus::Patched {
            substitutions: 1,
            rewrites: 0,
            ..
        })
    ));
    match &results[1].1 {
        Ok(PatchStatus::Patched {
            substitutions,
            rewrites,
            remaining,
            ..
        }) => {
            assert_eq!(*substitutions, 2);
            assert_eq!(*rewrites, 1);
            assert_eq!(
                *remaining,
                ConstructCounts {
                    named_groups: 0,
                    lookbehinds: 1,
                    named_backreferences: 0,
                }
            );
        }
        other => panic!("marked-esm: unexpected {other:?}"),
    }
    assert!(matches!(
        results[2].1,
        Ok(PatchStatus::Patched {
            substitutions: 2,
            rewrites: 1,
            ..
        })
    ));
    assert!(matches!(
        &results[3].1,
        Ok(PatchStatus::Skipped { reason }) if reason.contains("syntax highlighting")
    ));

    let mdast = read(root, "node_modules/mdast-util-gfm-autolink-literal/lib/index.js");
    assert!(mdast.contains(r"[/([-.\w+]+)@([-\w]+(?:\.[-\w]+)+)/g, findEmail]"));
    assert!(mdast.contains(r"www(?=\.)"));

    let esm = read(root, "node_modules/marked/lib/marked.esm.js");
    assert!(esm.contains(r"|(`+)[^`]+\1(?!`))*?\]\("));
    assert!(esm.contains(r"const codeSpan = /(?:[^`]|(`+)[^`]+\1(?!`))+/g;"));
    assert!(esm.contains(r"const heading = /^(#{1,6})\s/;"));
    assert!(esm.contains(r"const emStrongRDelim = /(?<=\w)_/;"));
    assert!(esm.starts_with(MARKED_ESM.lines().next().unwrap()));

    let umd = read(root, "node_modules/marked/lib/marked.umd.js");
    assert!(umd.contains(r#"new RegExp("^(#{1,6})\\s")"#));
    assert!(!umd.contains("(?<"));
}

#[test]
fn test_second_run_is_already_compatible() {
    let workspace = setup_mock_workspace("2.0.1");
    let set = load_from_path(PATCH_SET).unwrap();

    let _ = apply_targets(&set, workspace.path(), ApplyMode::Write);
    let results = apply_targets(&set, workspace.path(), ApplyMode::Write);

    for (id, result) in &results[..3] {
        assert!(
            matches!(result, Ok(PatchStatus::AlreadyCompatible { .. })),
            "{id}: {result:?}"
        );
    }
}

#[test]
fn test_mdast_v1_is_skipped() {
    let workspace = setup_mock_workspace("1.0.3");
    let set = load_from_path(PATCH_SET).unwrap();

    let results = apply_targets(&set, workspace.path(), ApplyMode::Write);
    assert!(matches!(
        &results[0].1,
        Ok(PatchStatus::Skipped { reason })
            if reason.contains("mdast-util-gfm-autolink-literal 1.0.3")
    ));
    assert_eq!(
        read(
            workspace.path(),
            "node_modules/mdast-util-gfm-autolink-literal/lib/index.js"
        ),
        MDAST_INDEX
    );
}

#[test]
fn test_upstream_change_is_suspect() {
    let workspace = setup_mock_workspace("2.1.0");
    let file = workspace
        .path()
        .join("node_modules/mdast-util-gfm-autolink-literal/lib/index.js");
    let drifted = MDAST_INDEX.replace(r"(?<=^|\s|\p{P}|\p{S})", r"(?<=^|\s|\p{P}|\p{S}|\p{Z})");
    assert_ne!(drifted, MDAST_INDEX);
    fs::write(&file, &drifted).unwrap();

    let set = load_from_path(PATCH_SET).unwrap();
    let results = apply_targets(&set, workspace.path(), ApplyMode::Write);

    match &results[0].1 {
        Ok(PatchStatus::Suspect {
            remaining, closest, ..
        }) => {
            assert_eq!(remaining.lookbehinds, 1);
            let closest = closest.as_ref().unwrap();
            assert_eq!(closest.line, 9);
            assert!(closest.snippet.starts_with(r"(?<=^|\s|\p{P}|\p{S}|\p{Z})"));
        }
        other => panic!("expected suspect, got {other:?}"),
    }
    // \p{...} still needs the `u` flag, so nothing may be rewritten
    let content = fs::read_to_string(&file).unwrap();
    assert_eq!(content, drifted);
    assert!(content.contains("/gu, findEmail]"));
}

#[test]
fn test_missing_packages() {
    let workspace = TempDir::new().unwrap();
    let set = load_from_path(PATCH_SET).unwrap();

    let results = apply_targets(&set, workspace.path(), ApplyMode::Write);
    for (_, result) in &results[..3] {
        assert!(matches!(result, Ok(PatchStatus::Missing { .. })));
    }
}
