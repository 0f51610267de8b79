//! Asset resolution for a given panel geometry.
//!
//! Assets are laid out on disk per panel size so one tree can serve several
//! devices:
//!
//! ```text
//! <root>/animations/<W>x<H>/*.gif
//! <root>/images/<W>x<H>/emojis/<id>.png
//! <root>/images/<W>x<H>/clocks/*.png
//! <root>/fonts/<name>.ttf
//! ```

use std::path::{Path, PathBuf};

use rand::prelude::*;

/// Lowest valid emoji sheet index.
pub const EMOJI_MIN_ID: u32 = 1;

/// Highest valid emoji sheet index.
pub const EMOJI_MAX_ID: u32 = 846;

/// The stock smiley, used when a submission names no emoji.
pub const EMOJI_DEFAULT_ID: u32 = 704;

/// Maps a requested emoji index to a sheet index. Anything absent or outside
/// the sheet range falls back to the stock smiley.
pub fn resolve_emoji_id(id: Option<u32>) -> u32 {
    match id {
        Some(id) if (EMOJI_MIN_ID..=EMOJI_MAX_ID).contains(&id) => id,
        _ => EMOJI_DEFAULT_ID,
    }
}

/// Error raised while resolving an asset path.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no .{ext} files under {}", dir.display())]
    EmptyDir { dir: PathBuf, ext: &'static str },

    #[error("cannot read asset directory {}", dir.display())]
    Unreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset name {0:?} is not a plain file stem")]
    InvalidName(String),
}

/// Resolves asset files for one panel geometry.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
    width: u32,
    height: u32,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            root: root.into(),
            width,
            height,
        }
    }

    /// Panel width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Panel height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolves an animation by file stem, or picks a random one when
    /// `name` is absent.
    pub fn animation(&self, name: Option<&str>) -> Result<PathBuf, AssetError> {
        let dir = self.size_dir("animations");
        match name {
            Some(name) => named_file(&dir, name, "gif"),
            None => random_file(&dir, "gif"),
        }
    }

    /// Resolves an emoji image, substituting the stock smiley for ids
    /// outside the sheet range.
    pub fn emoji(&self, id: Option<u32>) -> Result<PathBuf, AssetError> {
        let path = self
            .size_dir("images")
            .join("emojis")
            .join(format!("{}.png", resolve_emoji_id(id)));
        if path.is_file() {
            Ok(path)
        } else {
            Err(AssetError::NotFound(path))
        }
    }

    /// Resolves a clock face by file stem, or picks a random one when
    /// `name` is absent.
    pub fn clock_face(&self, name: Option<&str>) -> Result<PathBuf, AssetError> {
        let dir = self.size_dir("images").join("clocks");
        match name {
            Some(name) => named_file(&dir, name, "png"),
            None => random_file(&dir, "png"),
        }
    }

    /// Resolves a font by file stem.
    pub fn font(&self, name: &str) -> Result<PathBuf, AssetError> {
        named_file(&self.root.join("fonts"), name, "ttf")
    }

    /// Directory for assets that ship pre-scaled per panel size.
    fn size_dir(&self, category: &str) -> PathBuf {
        self.root
            .join(category)
            .join(format!("{}x{}", self.width, self.height))
    }
}

/// Resolves `<dir>/<name>.<ext>`, rejecting names that try to walk out of
/// the asset tree.
fn named_file(dir: &Path, name: &str, ext: &str) -> Result<PathBuf, AssetError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(AssetError::InvalidName(name.to_string()));
    }
    let path = dir.join(format!("{name}.{ext}"));
    if path.is_file() {
        Ok(path)
    } else {
        Err(AssetError::NotFound(path))
    }
}

/// Picks a random `.<ext>` file from `dir`.
fn random_file(dir: &Path, ext: &'static str) -> Result<PathBuf, AssetError> {
    let entries = std::fs::read_dir(dir).map_err(|source| AssetError::Unreadable {
        dir: dir.to_path_buf(),
        source,
    })?;
    let files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();

    files
        .choose(&mut rand::rng())
        .cloned()
        .ok_or(AssetError::EmptyDir {
            dir: dir.to_path_buf(),
            ext,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> (tempfile::TempDir, AssetLibrary) {
        let tmp = tempfile::tempdir().unwrap();
        let library = AssetLibrary::new(tmp.path(), 32, 32);
        (tmp, library)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn emoji_id_in_range_passes_through() {
        assert_eq!(resolve_emoji_id(Some(42)), 42);
        assert_eq!(resolve_emoji_id(Some(EMOJI_MIN_ID)), EMOJI_MIN_ID);
        assert_eq!(resolve_emoji_id(Some(EMOJI_MAX_ID)), EMOJI_MAX_ID);
    }

    #[test]
    fn wild_emoji_ids_fall_back_to_the_smiley() {
        assert_eq!(resolve_emoji_id(None), EMOJI_DEFAULT_ID);
        assert_eq!(resolve_emoji_id(Some(0)), EMOJI_DEFAULT_ID);
        assert_eq!(resolve_emoji_id(Some(847)), EMOJI_DEFAULT_ID);
        assert_eq!(resolve_emoji_id(Some(9999)), EMOJI_DEFAULT_ID);
    }

    #[test]
    fn named_animation_resolves_under_panel_size() {
        let (tmp, library) = library();
        let expected = tmp.path().join("animations/32x32/fire.gif");
        touch(&expected);

        let path = library.animation(Some("fire")).unwrap();
        assert_eq!(path, expected);
    }

    #[test]
    fn missing_named_animation_is_not_found() {
        let (_tmp, library) = library();
        assert!(matches!(
            library.animation(Some("fire")),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn random_animation_picks_an_existing_file() {
        let (tmp, library) = library();
        touch(&tmp.path().join("animations/32x32/a.gif"));
        touch(&tmp.path().join("animations/32x32/b.gif"));
        touch(&tmp.path().join("animations/32x32/notes.txt"));

        for _ in 0..8 {
            let path = library.animation(None).unwrap();
            assert_eq!(path.extension().unwrap(), "gif");
            assert!(path.is_file());
        }
    }

    #[test]
    fn random_animation_with_no_files_reports_empty_dir() {
        let (tmp, library) = library();
        fs::create_dir_all(tmp.path().join("animations/32x32")).unwrap();
        assert!(matches!(
            library.animation(None),
            Err(AssetError::EmptyDir { .. })
        ));
    }

    #[test]
    fn random_animation_with_no_directory_is_unreadable() {
        let (_tmp, library) = library();
        assert!(matches!(
            library.animation(None),
            Err(AssetError::Unreadable { .. })
        ));
    }

    #[test]
    fn emoji_path_substitutes_the_smiley_for_wild_ids() {
        let (tmp, library) = library();
        let expected = tmp.path().join("images/32x32/emojis/704.png");
        touch(&expected);

        let path = library.emoji(Some(5000)).unwrap();
        assert_eq!(path, expected);
    }

    #[test]
    fn font_resolves_from_shared_directory() {
        let (tmp, library) = library();
        let expected = tmp.path().join("fonts/pixel.ttf");
        touch(&expected);

        assert_eq!(library.font("pixel").unwrap(), expected);
    }

    #[test]
    fn names_with_separators_are_rejected() {
        let (tmp, library) = library();
        touch(&tmp.path().join("secret.gif"));

        assert!(matches!(
            library.animation(Some("../../secret")),
            Err(AssetError::InvalidName(_))
        ));
        assert!(matches!(
            library.font("a/b"),
            Err(AssetError::InvalidName(_))
        ));
    }
}
