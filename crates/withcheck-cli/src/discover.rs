use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use vfs::VfsPath;

use crate::error::{CliError, CliResult};

/// A template file to check.
#[derive(Debug, Clone)]
pub struct Target {
    /// Path as shown to the user, relative to the argument it came from.
    pub display: String,
    pub path: VfsPath,
}

/// Expand `paths` into template files.
///
/// Files named explicitly are always checked. Directories are walked
/// recursively in sorted order, skipping hidden entries and anything a
/// `.gitignore` met along the way excludes, and keeping files whose name
/// ends in one of `extensions`. An empty `paths` means `.`.
pub fn discover_templates(
    cwd: &VfsPath,
    paths: &[PathBuf],
    extensions: &[String],
) -> CliResult<Vec<Target>> {
    let default = [PathBuf::from(".")];
    let paths = if paths.is_empty() { &default[..] } else { paths };

    let mut targets: Vec<Target> = Vec::new();
    for arg in paths {
        let arg = arg.to_string_lossy();
        let path = resolve(cwd, &arg)?;
        if !path.exists()? {
            return Err(CliError::PathNotFound {
                path: arg.into_owned(),
            });
        }
        if path.is_file()? {
            push_unique(&mut targets, arg.into_owned(), path);
            continue;
        }

        let mut files = Vec::new();
        walk(&path, extensions, &mut Vec::new(), &mut files)?;
        tracing::debug!(dir = %arg, files = files.len(), "walked directory");
        for file in files {
            let relative = file
                .as_str()
                .strip_prefix(path.as_str())
                .unwrap_or(file.as_str())
                .trim_start_matches('/');
            let display = match arg.trim_end_matches('/') {
                "." | "" => relative.to_string(),
                dir => format!("{dir}/{relative}"),
            };
            push_unique(&mut targets, display, file);
        }
    }
    Ok(targets)
}

/// Resolve a command line path against `cwd`; absolute paths start at the
/// filesystem root.
pub(crate) fn resolve(cwd: &VfsPath, arg: &str) -> CliResult<VfsPath> {
    if let Some(absolute) = arg.strip_prefix('/') {
        let absolute = absolute.trim_end_matches('/');
        if absolute.is_empty() {
            return Ok(cwd.root());
        }
        return Ok(cwd.root().join(absolute)?);
    }
    let arg = arg.trim_start_matches("./").trim_end_matches('/');
    if arg.is_empty() || arg == "." {
        return Ok(cwd.clone());
    }
    Ok(cwd.join(arg)?)
}

fn push_unique(targets: &mut Vec<Target>, display: String, path: VfsPath) {
    if targets.iter().any(|t| t.path == path) {
        return;
    }
    targets.push(Target { display, path });
}

/// `.gitignore` matchers of the directories above the current one, paired
/// with the directory they were found in. Innermost last.
type IgnoreStack = Vec<(String, Gitignore)>;

fn walk(
    dir: &VfsPath,
    extensions: &[String],
    ignores: &mut IgnoreStack,
    out: &mut Vec<VfsPath>,
) -> CliResult<()> {
    let gitignore = load_gitignore(dir)?;
    let pushed = gitignore.is_some();
    if let Some(gitignore) = gitignore {
        ignores.push((dir.as_str().to_string(), gitignore));
    }

    let mut children: Vec<VfsPath> = dir.read_dir()?.collect();
    children.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    for child in children {
        let name = child.filename();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = child.is_dir()?;
        if is_ignored(ignores, &child, is_dir) {
            tracing::trace!(path = child.as_str(), "skipping ignored entry");
            continue;
        }
        if is_dir {
            walk(&child, extensions, ignores, out)?;
        } else if has_extension(&name, extensions) {
            out.push(child);
        }
    }

    if pushed {
        ignores.pop();
    }
    Ok(())
}

fn load_gitignore(dir: &VfsPath) -> CliResult<Option<Gitignore>> {
    let path = dir.join(".gitignore")?;
    if !path.exists()? || !path.is_file()? {
        return Ok(None);
    }
    let src = path.read_to_string()?;
    // patterns are matched against paths relative to `dir`
    let mut builder = GitignoreBuilder::new(".");
    for line in src.lines() {
        if let Err(err) = builder.add_line(None, line) {
            tracing::warn!(path = path.as_str(), %err, "skipping invalid .gitignore line");
        }
    }
    match builder.build() {
        Ok(gitignore) => Ok(Some(gitignore)),
        Err(err) => {
            tracing::warn!(path = path.as_str(), %err, "ignoring invalid .gitignore");
            Ok(None)
        }
    }
}

/// The innermost `.gitignore` with an opinion wins, so a nested `!pattern`
/// re-includes what a parent excluded.
fn is_ignored(ignores: &IgnoreStack, path: &VfsPath, is_dir: bool) -> bool {
    for (base, gitignore) in ignores.iter().rev() {
        let relative = path
            .as_str()
            .strip_prefix(base.as_str())
            .unwrap_or(path.as_str())
            .trim_start_matches('/');
        let matched = gitignore.matched(Path::new(relative), is_dir);
        if matched.is_ignore() {
            return true;
        }
        if matched.is_whitelist() {
            return false;
        }
    }
    false
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.');
        name.strip_suffix(ext)
            .and_then(|stem| stem.strip_suffix('.'))
            .is_some_and(|stem| !stem.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::{discover_templates, has_extension};
    use color_eyre::eyre;
    use std::path::PathBuf;
    use test_util::prelude::*;
    use vfs::VfsPath;

    fn extensions() -> Vec<String> {
        ["tmpl", "tpl", "gotmpl"].map(String::from).to_vec()
    }

    #[test]
    fn matches_configured_extensions() {
        let exts = extensions();
        assert!(has_extension("a.tmpl", &exts));
        assert!(has_extension("_helpers.tpl", &exts));
        assert!(!has_extension("tmpl", &exts));
        assert!(!has_extension("a.xtmpl", &exts));
        assert!(!has_extension("a.yaml", &exts));
        assert!(has_extension("page.tpl.html", &["tpl.html".to_string()]));
    }

    #[test]
    fn walks_directories_in_sorted_order() -> eyre::Result<()> {
        Builder::default().build();
        let root = VfsPath::new(vfs::MemoryFS::new());
        write(&root.join("templates/b.tmpl")?, "b")?;
        write(&root.join("templates/a/z.gotmpl")?, "z")?;
        write(&root.join("templates/a.tpl")?, "a")?;
        write(&root.join("templates/notes.txt")?, "skip")?;
        write(&root.join("templates/.cache/c.tmpl")?, "hidden")?;

        let targets = discover_templates(&root, &[PathBuf::from("templates")], &extensions())?;
        let paths: Vec<_> = targets.iter().map(|t| t.path.clone()).collect();
        assert_that!(&paths, contains_path("/templates/a/z.gotmpl"));
        assert_that!(&paths, not(contains_path("/templates/notes.txt")));
        assert_that!(&paths, not(contains_path("/templates/.cache/c.tmpl")));

        let display: Vec<_> = targets.iter().map(|t| t.display.as_str()).collect();
        sim_assert_eq!(
            display,
            vec!["templates/a/z.gotmpl", "templates/a.tpl", "templates/b.tmpl"]
        );
        Ok(())
    }

    #[test]
    fn honours_nested_gitignore_files() -> eyre::Result<()> {
        Builder::default().build();
        let root = VfsPath::new(vfs::MemoryFS::new());
        write(&root.join(".gitignore")?, "build/\n*.generated.tmpl\n")?;
        write(&root.join("build/out.tmpl")?, "ignored dir")?;
        write(&root.join("templates/ok.tmpl")?, "ok")?;
        write(&root.join("templates/x.generated.tmpl")?, "ignored file")?;
        write(&root.join("templates/nested/.gitignore")?, "!keep.generated.tmpl\n")?;
        write(&root.join("templates/nested/keep.generated.tmpl")?, "re-included")?;
        write(&root.join("templates/nested/build/deep.tmpl")?, "ignored at depth")?;

        let targets = discover_templates(&root, &[], &extensions())?;
        let display: Vec<_> = targets.iter().map(|t| t.display.as_str()).collect();
        sim_assert_eq!(
            display,
            vec!["templates/nested/keep.generated.tmpl", "templates/ok.tmpl"]
        );

        // explicit files bypass ignore rules
        let targets = discover_templates(&root, &[PathBuf::from("build/out.tmpl")], &extensions())?;
        assert_eq!(targets.len(), 1);
        Ok(())
    }

    #[test]
    fn explicit_files_ignore_extension_filter() -> eyre::Result<()> {
        Builder::default().build();
        let root = VfsPath::new(vfs::MemoryFS::new());
        write(&root.join("page.html")?, "{{ . }}")?;
        write(&root.join("x.tmpl")?, "x")?;

        let targets = discover_templates(
            &root,
            &[PathBuf::from("./page.html"), PathBuf::from(".")],
            &extensions(),
        )?;
        let display: Vec<_> = targets.iter().map(|t| t.display.as_str()).collect();
        sim_assert_eq!(display, vec!["./page.html", "x.tmpl"]);
        Ok(())
    }

    #[test]
    fn missing_path_is_an_error() {
        let root = VfsPath::new(vfs::MemoryFS::new());
        let err = discover_templates(&root, &[PathBuf::from("nope")], &extensions())
            .expect_err("missing");
        assert_eq!(err.to_string(), "path nope does not exist");
    }
}
