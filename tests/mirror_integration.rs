//! Integration tests for the mirror operations.
//!
//! These tests build real upstream repositories in temp directories, serve
//! them over `file://` URLs and mirror them with the real `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use shallowmirror::mirror::{Exclude, Mirror, MirrorError};

/// An upstream repository with a small tree and a `v1.0.0` tag.
struct Upstream {
    _dir: TempDir,
    path: PathBuf,
}

impl Upstream {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("widget");
        std::fs::create_dir_all(&path).unwrap();

        run_git(&path, &["init", "--quiet"]);
        run_git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(&path, &["config", "user.email", "upstream@example.com"]);
        run_git(&path, &["config", "user.name", "Upstream"]);
        run_git(&path, &["config", "commit.gpgsign", "false"]);
        run_git(&path, &["config", "tag.gpgsign", "false"]);

        let upstream = Self { _dir: dir, path };
        upstream.write("README.md", "# widget v1\n");
        upstream.write("docs/guide.md", "guide\n");
        upstream.write("docs/api/index.md", "api\n");
        upstream.write("bin/run.sh", "#!/bin/sh\necho run\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                upstream.path.join("bin/run.sh"),
                std::fs::Permissions::from_mode(0o755),
            )
            .unwrap();
        }
        run_git(&upstream.path, &["add", "-A"]);
        run_git(&upstream.path, &["commit", "--quiet", "-m", "Initial commit"]);
        upstream.tag("v1.0.0", "Release 1.0.0");
        upstream
    }

    fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    fn write(&self, rel: &str, content: &str) {
        let file = self.path.join(rel);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }

    fn commit_file(&self, rel: &str, content: &str, message: &str) {
        self.write(rel, content);
        run_git(&self.path, &["add", rel]);
        run_git(&self.path, &["commit", "--quiet", "-m", message]);
    }

    fn tag(&self, name: &str, message: &str) {
        run_git(&self.path, &["tag", "-a", name, "-m", message]);
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap()
}

fn mirror() -> (TempDir, Mirror) {
    let root = TempDir::new().expect("failed to create storage root");
    let mirror = Mirror::new(root.path());
    (root, mirror)
}

// =============================================================================
// Initializer
// =============================================================================

#[tokio::test]
async fn init_clones_into_storage_root() {
    let upstream = Upstream::new();
    upstream.commit_file("CHANGELOG.md", "- second\n", "Second commit");
    let (root, mirror) = mirror();
    let mirror = mirror.with_clone_depth(1);

    let dir = mirror.init_repo(&upstream.url(), None).await.unwrap();

    assert_eq!(dir, root.path().join("widget"));
    assert!(dir.join("README.md").is_file());
    assert_eq!(
        run_git(&dir, &["rev-parse", "--is-shallow-repository"]).trim(),
        "true"
    );

    // Reuse: a second call sees the same directory.
    assert_eq!(mirror.init_repo(&upstream.url(), None).await.unwrap(), dir);
}

#[tokio::test]
async fn init_checks_out_tag() {
    let upstream = Upstream::new();
    upstream.commit_file("README.md", "# widget v2\n", "Bump");
    let (_root, mirror) = mirror();
    let url = upstream.url();

    let readme = mirror.read_file(&url, "README.md", Some("v1.0.0")).await.unwrap();
    assert_eq!(readme, "# widget v1\n");
    assert_eq!(mirror.current_tag(&url).await.unwrap(), "v1.0.0");

    let readme = mirror.read_file(&url, "README.md", Some("main")).await.unwrap();
    assert_eq!(readme, "# widget v2\n");
    assert_eq!(mirror.current_branch(&url).await.unwrap(), "main");
}

#[tokio::test]
async fn checkout_fetches_refs_missing_from_clone() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();
    mirror.init_repo(&url, None).await.unwrap();

    upstream.commit_file("CHANGELOG.md", "2.0.0\n", "Release 2");
    upstream.tag("v2.0.0", "Release 2.0.0");

    mirror.checkout(&url, "v2.0.0").await.unwrap();

    assert_eq!(mirror.current_tag(&url).await.unwrap(), "v2.0.0");
    assert_eq!(
        mirror.read_file(&url, "CHANGELOG.md", None).await.unwrap(),
        "2.0.0\n"
    );
}

#[tokio::test]
async fn unknown_ref_fails_after_retry() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();

    let err = mirror
        .checkout(&upstream.url(), "no-such-ref")
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::Command(_)), "{err}");
}

#[tokio::test]
async fn unsafe_ref_never_reaches_git() {
    let upstream = Upstream::new();
    let (root, mirror) = mirror();

    let err = mirror
        .init_repo(&upstream.url(), Some("--upload-pack=touch pwned"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(!root.path().join("widget").exists());
}

#[tokio::test]
async fn clone_of_missing_repository_fails() {
    let (_root, mirror) = mirror();
    let missing = TempDir::new().unwrap();
    let url = format!("file://{}/absent", missing.path().display());

    let err = mirror.init_repo(&url, None).await.unwrap_err();

    assert!(matches!(err, MirrorError::Clone { .. }), "{err}");
}

#[tokio::test]
async fn clone_that_warns_leaves_no_working_copy() {
    let empty = TempDir::new().unwrap();
    let path = empty.path().join("hollow");
    std::fs::create_dir_all(&path).unwrap();
    run_git(&path, &["init", "--quiet"]);
    let url = format!("file://{}", path.display());
    let (root, mirror) = mirror();

    for _ in 0..2 {
        let err = mirror.init_repo(&url, None).await.unwrap_err();
        assert!(matches!(err, MirrorError::Clone { .. }), "{err}");
        assert!(!root.path().join("hollow").exists());
    }
}

// =============================================================================
// Files
// =============================================================================

#[tokio::test]
async fn lists_folders_and_files() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    assert_eq!(
        mirror.list_folders(&url, "", None).await.unwrap(),
        vec!["bin", "docs"]
    );
    assert_eq!(
        mirror.list_folders(&url, "docs", None).await.unwrap(),
        vec!["docs/api"]
    );

    let files = mirror.list_files(&url, "", None, &[]).await.unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["README.md", "bin/run.sh", "docs/api/index.md", "docs/guide.md"]
    );
    #[cfg(unix)]
    {
        assert!(files[1].executable);
        assert!(!files[0].executable);
    }
}

#[tokio::test]
async fn list_files_with_excludes() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();

    let excludes = [
        Exclude::pattern("docs/"),
        Exclude::for_ref(|r| match r {
            Some("v1.0.0") => "bin/run.sh".to_string(),
            _ => "nothing".to_string(),
        }),
    ];
    let files = mirror
        .list_files(&upstream.url(), "", Some("v1.0.0"), &excludes)
        .await
        .unwrap();

    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md"]);
}

#[tokio::test]
async fn missing_path_lists_nothing() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    assert!(mirror
        .list_files(&url, "does/not/exist", None, &[])
        .await
        .unwrap()
        .is_empty());
    assert!(mirror
        .list_folders(&url, "does/not/exist", None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn last_commit_time() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    let time = mirror
        .last_commit_time_for_file(&url, "README.md", None)
        .await
        .unwrap()
        .expect("README.md has history");
    assert!(time.timestamp() > 0);

    assert!(mirror
        .last_commit_time_for_file(&url, "never-committed.txt", None)
        .await
        .unwrap()
        .is_none());
}

// =============================================================================
// Refs
// =============================================================================

#[tokio::test]
async fn tag_creation_is_idempotent() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    for _ in 0..2 {
        mirror
            .create_tag_for_ref(&url, "v1.0.0", "mirror-v1.0.0", "it's mirrored", None)
            .await
            .unwrap();
    }
    assert!(mirror
        .list_tags(&url)
        .await
        .unwrap()
        .contains(&"mirror-v1.0.0".to_string()));

    let err = mirror
        .create_tag_for_ref(&url, "v1.0.0", "mirror-v1.0.0", "something else", None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = mirror
        .create_tag_for_ref(
            &url,
            "v1.0.0",
            "mirror-v1.0.0",
            "something else",
            Some("mirror tag was rewritten"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "mirror tag was rewritten");
}

#[tokio::test]
async fn tag_of_annotated_tag_points_at_its_commit() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    mirror
        .create_tag_for_ref(&url, "v1.0.0", "mirror-v1.0.0", "mirrored", None)
        .await
        .unwrap();

    let dir = mirror.working_copy_dir(&url).unwrap();
    assert_eq!(
        run_git(&dir, &["rev-parse", "mirror-v1.0.0^{}"]),
        run_git(&dir, &["rev-parse", "v1.0.0^{commit}"])
    );
    assert_eq!(
        run_git(&dir, &["cat-file", "-t", "mirror-v1.0.0"]).trim(),
        "tag"
    );
    // The new tag is visible through the refreshed probe.
    let described = mirror.current_tag(&url).await.unwrap();
    assert!(described == "v1.0.0" || described == "mirror-v1.0.0", "{described}");
}

#[tokio::test]
async fn existing_upstream_tag_with_same_message() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();

    mirror
        .create_tag_for_ref(&upstream.url(), "main", "v1.0.0", "Release 1.0.0", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn branch_add_and_commit() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();

    mirror.create_branch(&url, "mirror/work", "main").await.unwrap();
    assert_eq!(mirror.current_branch(&url).await.unwrap(), "mirror/work");

    let dir = mirror.working_copy_dir(&url).unwrap();
    std::fs::write(dir.join("README.md"), "# patched\n").unwrap();
    std::fs::write(dir.join("untracked.txt"), "stay out\n").unwrap();

    mirror.add_updated(&url, ".").await.unwrap();
    mirror
        .commit(&url, "mirror/work", "Patch 'readme'")
        .await
        .unwrap();

    let log = run_git(&dir, &["log", "-1", "--format=%an <%ae>%n%s"]);
    assert_eq!(log, "shallowmirror <shallowmirror@localhost>\nPatch \"readme\"\n");
    let status = run_git(&dir, &["status", "--porcelain"]);
    assert_eq!(status, "?? untracked.txt\n");

    // Switching back to an existing branch does not recreate it.
    mirror.create_branch(&url, "main", "v1.0.0").await.unwrap();
    assert_eq!(mirror.current_branch(&url).await.unwrap(), "main");
    mirror.create_branch(&url, "mirror/work", "main").await.unwrap();
    assert_eq!(
        mirror.read_file(&url, "README.md", None).await.unwrap(),
        "# patched\n"
    );
}

#[tokio::test]
async fn pull_fast_forwards() {
    let upstream = Upstream::new();
    let (_root, mirror) = mirror();
    let url = upstream.url();
    mirror.init_repo(&url, Some("main")).await.unwrap();

    upstream.commit_file("README.md", "# widget v3\n", "Bump again");
    mirror.pull(&url, "main").await.unwrap();

    assert_eq!(
        mirror.read_file(&url, "README.md", None).await.unwrap(),
        "# widget v3\n"
    );
}

#[tokio::test]
async fn mirrors_share_nothing_across_roots() {
    let upstream = Upstream::new();
    let (_a_root, a) = mirror();
    let (_b_root, b) = mirror();
    let url = upstream.url();

    let (tags_a, tags_b) = tokio::join!(a.list_tags(&url), b.list_tags(&url));

    assert_eq!(tags_a.unwrap(), vec!["v1.0.0"]);
    assert_eq!(tags_b.unwrap(), vec!["v1.0.0"]);
    assert_ne!(
        a.working_copy_dir(&url).unwrap(),
        b.working_copy_dir(&url).unwrap()
    );
}
