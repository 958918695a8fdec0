//! Pathname Expansion
//!
//! Matches a glob against the virtual filesystem one path component at a
//! time. Components without metacharacters are looked up directly; the rest
//! are matched against directory listings with the shared pattern matcher.
//!
//! Hidden entries need `dotglob` or a pattern component starting with `.`;
//! `.` and `..` never match. Under `globstar`, a `**` component matches any
//! number of directories. Results are sorted and keep the pattern's
//! relative or absolute form.

use crate::fs::types::FileSystem;
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::pattern::{has_glob_chars, unescape_pattern, MatchFlags, Pattern};

/// A candidate path: where it lives and how it is printed.
#[derive(Debug, Clone)]
struct Candidate {
    fs_path: String,
    display: String,
}

fn join_fs(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

fn join_display(display: &str, name: &str) -> String {
    if display.is_empty() {
        name.to_string()
    } else if display.ends_with('/') {
        format!("{}{}", display, name)
    } else {
        format!("{}/{}", display, name)
    }
}

struct GlobWalker<'a> {
    fs: &'a dyn FileSystem,
    flags: MatchFlags,
    dotglob: bool,
    globstar: bool,
}

impl<'a> GlobWalker<'a> {
    async fn is_dir(&self, path: &str) -> bool {
        self.fs.stat(path).await.map(|s| s.is_directory).unwrap_or(false)
    }

    fn hidden_allowed(&self, component: &str, name: &str) -> bool {
        if name == "." || name == ".." {
            return false;
        }
        !name.starts_with('.') || self.dotglob || component.starts_with('.') || component.starts_with("\\.")
    }

    async fn match_component(&self, dir: &Candidate, component: &str) -> Vec<Candidate> {
        let Ok(entries) = self.fs.readdir(&dir.fs_path).await else {
            return Vec::new();
        };
        let pattern = Pattern::new(component, self.flags);
        entries
            .into_iter()
            .filter(|e| self.hidden_allowed(component, &e.name) && pattern.is_match(&e.name))
            .map(|e| Candidate { fs_path: join_fs(&dir.fs_path, &e.name), display: join_display(&dir.display, &e.name) })
            .collect()
    }

    /// `dir` plus every directory below it, skipping hidden ones unless
    /// `dotglob` is on.
    async fn descend_all(&self, dir: &Candidate, include_files: bool) -> Vec<Candidate> {
        let mut out = Vec::new();
        let mut stack = vec![dir.clone()];
        while let Some(current) = stack.pop() {
            let Ok(entries) = self.fs.readdir(&current.fs_path).await else {
                continue;
            };
            for entry in entries {
                if entry.name.starts_with('.') && !self.dotglob {
                    continue;
                }
                let child = Candidate {
                    fs_path: join_fs(&current.fs_path, &entry.name),
                    display: join_display(&current.display, &entry.name),
                };
                if entry.is_directory {
                    stack.push(child.clone());
                    out.push(child);
                } else if include_files {
                    out.push(child);
                }
            }
        }
        out
    }

    async fn expand(&self, pattern: &str, cwd: &str) -> Vec<String> {
        let absolute = pattern.starts_with('/');
        let trailing_slash = pattern.len() > 1 && pattern.ends_with('/');
        let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
        let root = if absolute {
            Candidate { fs_path: "/".to_string(), display: "/".to_string() }
        } else {
            Candidate { fs_path: cwd.to_string(), display: String::new() }
        };

        let mut current = vec![root];
        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            let mut next = Vec::new();
            for dir in &current {
                if self.globstar && *component == "**" {
                    if !last {
                        next.push(dir.clone());
                    }
                    next.extend(self.descend_all(dir, last).await);
                } else if has_glob_chars(component, self.flags.extglob) {
                    next.extend(self.match_component(dir, component).await);
                } else {
                    let name = unescape_pattern(component);
                    let candidate =
                        Candidate { fs_path: join_fs(&dir.fs_path, &name), display: join_display(&dir.display, &name) };
                    if self.fs.exists(&candidate.fs_path).await {
                        next.push(candidate);
                    }
                }
            }
            if !last || trailing_slash {
                let mut dirs = Vec::with_capacity(next.len());
                for c in next {
                    if self.is_dir(&c.fs_path).await {
                        dirs.push(c);
                    }
                }
                next = dirs;
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }

        let mut results: Vec<String> = current
            .into_iter()
            .map(|c| if trailing_slash { format!("{}/", c.display) } else { c.display })
            .filter(|d| !d.is_empty())
            .collect();
        results.sort();
        results.dedup();
        results
    }
}

impl Interpreter {
    /// Expands a glob pattern (quoted characters already backslash-escaped)
    /// to the sorted list of matching paths. Empty when nothing matches.
    pub(crate) async fn glob_expand(&self, pattern: &str) -> Vec<String> {
        let shopt = &self.state.shopt_options;
        let walker = GlobWalker {
            fs: self.fs.as_ref(),
            flags: MatchFlags { extglob: shopt.extglob, nocase: shopt.nocaseglob },
            dotglob: shopt.dotglob,
            globstar: shopt.globstar,
        };
        let matches = walker.expand(pattern, &self.state.cwd).await;
        tracing::trace!(pattern, count = matches.len(), "glob");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn walker(fs: &InMemoryFs) -> GlobWalker<'_> {
        GlobWalker { fs, flags: MatchFlags { extglob: true, nocase: false }, dotglob: false, globstar: false }
    }

    fn sample_fs() -> InMemoryFs {
        InMemoryFs::with_files([
            ("/tmp/foo.c", ""),
            ("/tmp/foo.h", ""),
            ("/tmp/foo.o", ""),
            ("/tmp/.hidden", ""),
            ("/tmp/sub/a.txt", ""),
            ("/tmp/sub/deep/b.txt", ""),
        ])
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_absolute_and_relative_patterns() {
        let fs = sample_fs();
        let w = walker(&fs);
        assert_eq!(w.expand("/tmp/foo.@(c|h)", "/").await, vec!["/tmp/foo.c", "/tmp/foo.h"]);
        assert_eq!(w.expand("foo.*", "/tmp").await, vec!["foo.c", "foo.h", "foo.o"]);
        assert_eq!(w.expand("*/a.txt", "/tmp").await, vec!["sub/a.txt"]);
        assert!(w.expand("*.zip", "/tmp").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hidden_files() {
        let fs = sample_fs();
        let mut w = walker(&fs);
        assert!(!w.expand("*", "/tmp").await.contains(&".hidden".to_string()));
        assert_eq!(w.expand(".h*", "/tmp").await, vec![".hidden"]);
        w.dotglob = true;
        assert!(w.expand("*", "/tmp").await.contains(&".hidden".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_directories_only_with_trailing_slash() {
        let fs = sample_fs();
        let w = walker(&fs);
        assert_eq!(w.expand("*/", "/tmp").await, vec!["sub/"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_globstar() {
        let fs = sample_fs();
        let mut w = walker(&fs);
        w.globstar = true;
        assert_eq!(w.expand("sub/**/*.txt", "/tmp").await, vec!["sub/a.txt", "sub/deep/b.txt"]);
    }
}
