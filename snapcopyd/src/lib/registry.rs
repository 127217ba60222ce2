use camino::{Utf8Path, Utf8PathBuf};
use dashmap::{mapref::entry::Entry, DashMap};
use rand::Rng;
use snapcopy::{path, Error, Token};

/// Directories published for remote reading, indexed by token.
///
/// Lookups only take a shard read lock, so concurrent requests are not
/// serialized against each other. Nothing here closes a session on its own:
/// whoever publishes a directory must keep it alive until the readers are done.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<Token, Utf8PathBuf>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `root` under a fresh random token.
    pub fn publish<P: AsRef<Utf8Path>>(&self, root: P) -> snapcopy::Result<Token> {
        let root = check_root(root.as_ref())?;
        let mut rng = rand::thread_rng();
        loop {
            let token: Token = rng.gen_range(1..=Token::MAX);
            if let Entry::Vacant(entry) = self.sessions.entry(token) {
                log::info!("publishing {root} as session {token}");
                entry.insert(root);
                return Ok(token);
            }
        }
    }

    /// Publish `root` under a token chosen by the caller.
    pub fn publish_with_token<P: AsRef<Utf8Path>>(
        &self,
        token: Token,
        root: P,
    ) -> snapcopy::Result<()> {
        let root = check_root(root.as_ref())?;
        match self.sessions.entry(token) {
            Entry::Occupied(..) => Err(Error::SessionExists(token)),
            Entry::Vacant(entry) => {
                log::info!("publishing {root} as session {token}");
                entry.insert(root);
                Ok(())
            }
        }
    }

    /// Remove a session and return its root.
    pub fn unpublish(&self, token: Token) -> snapcopy::Result<Utf8PathBuf> {
        let (_, root) = self
            .sessions
            .remove(&token)
            .ok_or(Error::SessionNotFound(token))?;
        log::info!("unpublished session {token} ({root})");
        Ok(root)
    }

    pub fn root(&self, token: Token) -> snapcopy::Result<Utf8PathBuf> {
        self.sessions
            .get(&token)
            .map(|root| root.value().clone())
            .ok_or(Error::SessionNotFound(token))
    }

    /// Resolve `rel_path` within session `token`.
    ///
    /// The check is lexical: `..` may not climb above the root.
    pub fn resolve(&self, token: Token, rel_path: &str) -> snapcopy::Result<Utf8PathBuf> {
        let root = self.root(token)?;
        let rel_path = path::normalize(rel_path)?;
        Ok(root.join(rel_path))
    }

    /// Like [`Self::resolve`], but also follows symlinks of existing paths
    /// and rejects the ones leading out of the root.
    pub async fn resolve_contained(
        &self,
        token: Token,
        rel_path: &str,
    ) -> snapcopy::Result<Utf8PathBuf> {
        let root = self.root(token)?;
        let fs_path = root.join(path::normalize(rel_path)?);
        // missing paths are left for the caller to report
        if let Ok(real) = tokio::fs::canonicalize(&fs_path).await {
            if !real.starts_with(&root) {
                return Err(Error::PathEscape(rel_path.to_string()));
            }
        }
        Ok(fs_path)
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.sessions.iter().map(|s| *s.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn check_root(root: &Utf8Path) -> snapcopy::Result<Utf8PathBuf> {
    let invalid = |err: std::io::Error| Error::InvalidPath(format!("{root}: {err}"));

    let root = root.canonicalize_utf8().map_err(invalid)?;
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!("{root} is not a directory")));
    }
    root.read_dir_utf8().map_err(invalid)?;
    Ok(root)
}
