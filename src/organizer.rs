//! One full organization pass over a root directory.
//!
//! A pass walks the fixed sequence Scanning → Classifying → Grouping →
//! Moving → ReviewSweep → Cleaning → Done. Each organized root (Downloads,
//! Desktop) runs the sequence independently on its own thread; a failure in
//! one root never aborts the other. The pass works from a fresh filesystem
//! snapshot, holds no long-lived locks, and treats every per-file error as
//! recoverable: log, skip, continue.

use chrono::{DateTime, Local, NaiveDate};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::classifier::{CategoryTable, Classification, FALLBACK_CATEGORY, FOLDERS_CATEGORY};
use crate::cleaner::FolderCleaner;
use crate::config::{CompiledFilters, ConfigError, Settings};
use crate::grouper::{GroupItem, Grouper};
use crate::monitor::AccessMonitor;
use crate::tagger::TagManager;

/// The phases a pass moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Scanning,
    Classifying,
    Grouping,
    Moving,
    ReviewSweep,
    Cleaning,
    Done,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassPhase::Scanning => "scanning",
            PassPhase::Classifying => "classifying",
            PassPhase::Grouping => "grouping",
            PassPhase::Moving => "moving",
            PassPhase::ReviewSweep => "review sweep",
            PassPhase::Cleaning => "cleaning",
            PassPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Callback invoked as a root's pass enters each phase.
pub type PhaseCallback<'cb> = &'cb (dyn Fn(&Path, PassPhase) + Sync);

/// What one pass did to one root.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub root: PathBuf,
    /// Files and folders relocated into the category tree.
    pub moved: usize,
    /// Subset of `moved` placed inside a similarity group folder.
    pub grouped: usize,
    /// Stale files promoted under the Review folder.
    pub reviewed: usize,
    /// Empty directories removed by the cleanup sweep.
    pub removed_dirs: usize,
    /// Entries skipped because of per-file errors.
    pub skipped: usize,
    /// True when a stop request halted the pass early.
    pub cancelled: bool,
}

impl PassReport {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            moved: 0,
            grouped: 0,
            reviewed: 0,
            removed_dirs: 0,
            skipped: 0,
            cancelled: false,
        }
    }
}

/// Errors that abort a whole root's pass (per-file errors never do).
#[derive(Debug)]
pub enum OrganizeError {
    /// The organized root does not exist or is not a directory.
    RootMissing(PathBuf),
    /// The root directory could not be enumerated.
    ScanFailed {
        root: PathBuf,
        source: std::io::Error,
    },
    /// A special folder (Manual/Review) could not be created.
    SpecialFolderFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A root's worker thread panicked.
    PassPanicked(PathBuf),
}

impl fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootMissing(path) => {
                write!(f, "Organized root does not exist: {}", path.display())
            }
            Self::ScanFailed { root, source } => {
                write!(f, "Failed to scan {}: {}", root.display(), source)
            }
            Self::SpecialFolderFailed { path, source } => {
                write!(
                    f,
                    "Failed to create special folder {}: {}",
                    path.display(),
                    source
                )
            }
            Self::PassPanicked(root) => {
                write!(f, "Pass for {} panicked", root.display())
            }
        }
    }
}

impl std::error::Error for OrganizeError {}

/// A file captured by the pass snapshot, classified and ready for grouping.
///
/// Transient: rebuilt from the filesystem every pass, never persisted.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub stem: String,
    pub extension: Option<String>,
    pub mime: Option<String>,
    pub modified: Option<SystemTime>,
    /// `None` when the filesystem does not track access times.
    pub accessed: Option<SystemTime>,
    pub classification: Classification,
}

struct ScannedFile {
    path: PathBuf,
    stem: String,
    extension: Option<String>,
    modified: Option<SystemTime>,
    accessed: Option<SystemTime>,
}

struct Snapshot {
    files: Vec<ScannedFile>,
    /// Loose top-level directories headed for the Folders category.
    dirs: Vec<PathBuf>,
}

struct PlannedMove {
    source: PathBuf,
    dest_dir: PathBuf,
    grouped: bool,
}

/// Drives organization passes. Immutable while passes run, so one organizer
/// can serve both roots concurrently.
pub struct Organizer<'a> {
    settings: &'a Settings,
    table: &'a CategoryTable,
    filters: CompiledFilters,
    grouper: Grouper,
    monitor: AccessMonitor,
    tagger: TagManager,
    dry_run: bool,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Organizer<'a> {
    /// Build an organizer for one pass from immutable settings and table.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the filter rules fail to compile.
    pub fn new(settings: &'a Settings, table: &'a CategoryTable) -> Result<Self, ConfigError> {
        Ok(Self {
            filters: settings.compile_filters()?,
            grouper: Grouper::new(&settings.grouping),
            monitor: AccessMonitor::new(settings.review_threshold()),
            tagger: TagManager::new(),
            settings,
            table,
            dry_run: false,
            cancel: None,
        })
    }

    /// Plan and log moves without touching the filesystem.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Observe a stop flag between per-file operations: the in-flight move
    /// finishes, then the pass halts before starting the next file.
    pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run a full pass over every root, one thread per root.
    ///
    /// The roots are disjoint subtrees sharing only this immutable
    /// organizer, so the passes cannot interfere with each other.
    pub fn organize_all(
        &self,
        roots: &[PathBuf],
        on_phase: Option<PhaseCallback>,
    ) -> Vec<(PathBuf, Result<PassReport, OrganizeError>)> {
        thread::scope(|scope| {
            let handles: Vec<_> = roots
                .iter()
                .map(|root| {
                    scope.spawn(move || self.run_pass_with_callback(root, on_phase))
                })
                .collect();

            roots
                .iter()
                .zip(handles)
                .map(|(root, handle)| match handle.join() {
                    Ok(result) => (root.clone(), result),
                    Err(_) => (
                        root.clone(),
                        Err(OrganizeError::PassPanicked(root.clone())),
                    ),
                })
                .collect()
        })
    }

    /// Run one pass over a single root.
    pub fn run_pass(&self, root: &Path) -> Result<PassReport, OrganizeError> {
        self.run_pass_with_callback(root, None)
    }

    /// Run one pass over a single root, reporting phase transitions.
    pub fn run_pass_with_callback(
        &self,
        root: &Path,
        on_phase: Option<PhaseCallback>,
    ) -> Result<PassReport, OrganizeError> {
        if !root.is_dir() {
            return Err(OrganizeError::RootMissing(root.to_path_buf()));
        }

        let manual_dir = root.join(&self.settings.organizer.manual_folder);
        let review_dir = root.join(&self.settings.organizer.review_folder);
        self.ensure_special_folders(&manual_dir, &review_dir)?;

        let mut report = PassReport::new(root.to_path_buf());
        let phase = |p: PassPhase| {
            debug!(root = %root.display(), phase = %p, "entering phase");
            if let Some(cb) = on_phase {
                cb(root, p);
            }
        };

        phase(PassPhase::Scanning);
        let snapshot = self.scan(root, &mut report)?;

        phase(PassPhase::Classifying);
        let files = self.classify_files(snapshot.files);

        phase(PassPhase::Grouping);
        let moves = self.plan_moves(root, &files, &snapshot.dirs);

        phase(PassPhase::Moving);
        let mut moved = HashSet::new();
        for planned in &moves {
            if self.cancelled() {
                report.cancelled = true;
                break;
            }
            self.execute_move(planned, &mut moved, &mut report);
        }

        if !report.cancelled {
            phase(PassPhase::ReviewSweep);
            self.review_sweep(root, &review_dir, &moved, &mut report);
        }

        if !report.cancelled {
            phase(PassPhase::Cleaning);
            if !self.dry_run {
                let cleaner = FolderCleaner::new(vec![
                    self.settings.organizer.manual_folder.clone(),
                    self.settings.organizer.review_folder.clone(),
                ]);
                report.removed_dirs = cleaner.clean(root);
            }
        }

        phase(PassPhase::Done);
        info!(
            root = %report.root.display(),
            moved = report.moved,
            grouped = report.grouped,
            reviewed = report.reviewed,
            removed_dirs = report.removed_dirs,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "pass finished"
        );
        Ok(report)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn ensure_special_folders(
        &self,
        manual_dir: &Path,
        review_dir: &Path,
    ) -> Result<(), OrganizeError> {
        if self.dry_run {
            return Ok(());
        }

        for (dir, color) in [
            (manual_dir, &self.settings.tags.manual_color),
            (review_dir, &self.settings.tags.review_color),
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| OrganizeError::SpecialFolderFailed {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
                info!(dir = %dir.display(), "created special folder");
            }
            if let Some(label) = dir.file_name().map(|n| n.to_string_lossy().to_string()) {
                self.tagger.apply(dir, &label, color);
            }
        }
        Ok(())
    }

    /// Take a fresh snapshot of the root: loose top-level entries, plus
    /// files still sitting directly under a `category/subcategory` folder so
    /// later arrivals can join the groups of earlier ones.
    fn scan(&self, root: &Path, report: &mut PassReport) -> Result<Snapshot, OrganizeError> {
        let entries = fs::read_dir(root).map_err(|e| OrganizeError::ScanFailed {
            root: root.to_path_buf(),
            source: e,
        })?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(file_type) = entry.file_type() else {
                report.skipped += 1;
                continue;
            };

            if file_type.is_dir() {
                if name == self.settings.organizer.manual_folder
                    || name == self.settings.organizer.review_folder
                {
                    continue;
                }
                if self.table.is_category_dir(&name) {
                    // Folders holds relocated directories whose contents
                    // belong to them; only file categories get rescanned.
                    if name != FOLDERS_CATEGORY {
                        self.scan_subcategories(&path, &mut files);
                    }
                    continue;
                }
                if name.starts_with('.') {
                    continue;
                }
                // Bundles like Foo.app carry a classifiable extension and
                // move as a unit; anything else is a loose folder.
                if self.has_known_extension(&path) {
                    files.push(self.scanned_file(path));
                } else {
                    dirs.push(path);
                }
            } else if file_type.is_file() {
                if self.filters.should_include(&path) {
                    files.push(self.scanned_file(path));
                }
            }
        }

        Ok(Snapshot { files, dirs })
    }

    /// Collect ungrouped files lying directly under each subcategory folder
    /// of one category directory. Files already inside group folders stay
    /// where they are.
    fn scan_subcategories(&self, category_dir: &Path, files: &mut Vec<ScannedFile>) {
        let Ok(subcats) = fs::read_dir(category_dir) else {
            return;
        };
        for subcat in subcats.flatten() {
            if !subcat.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Ok(entries) = fs::read_dir(subcat.path()) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                    && self.filters.should_include(&entry.path())
                {
                    files.push(self.scanned_file(entry.path()));
                }
            }
        }
    }

    fn has_known_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .map(|ext| self.table.classify(Some(&ext), None).category != FALLBACK_CATEGORY)
            .unwrap_or(false)
    }

    fn scanned_file(&self, path: PathBuf) -> ScannedFile {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
        let metadata = fs::metadata(&path).ok();
        let modified = metadata.as_ref().and_then(|m| m.modified().ok());
        let accessed = metadata.as_ref().and_then(|m| m.accessed().ok());
        ScannedFile {
            path,
            stem,
            extension,
            modified,
            accessed,
        }
    }

    fn classify_files(&self, scanned: Vec<ScannedFile>) -> Vec<FileEntry> {
        scanned
            .into_iter()
            .map(|file| {
                // Content sniffing only pays off when the extension alone
                // does not classify the file.
                let known = file
                    .extension
                    .as_deref()
                    .map(|ext| self.table.classify(Some(ext), None).category != FALLBACK_CATEGORY)
                    .unwrap_or(false);
                let mime = if known {
                    None
                } else {
                    infer::get_from_path(&file.path)
                        .ok()
                        .flatten()
                        .map(|kind| kind.mime_type().to_string())
                };

                let classification = self
                    .table
                    .classify(file.extension.as_deref(), mime.as_deref());

                FileEntry {
                    path: file.path,
                    stem: file.stem,
                    extension: file.extension,
                    mime,
                    modified: file.modified,
                    accessed: file.accessed,
                    classification,
                }
            })
            .collect()
    }

    /// Compute every destination for this pass. Destinations are a pure
    /// function of (category, subcategory, group), which is what makes
    /// repeated passes settle instead of reshuffling.
    fn plan_moves(&self, root: &Path, files: &[FileEntry], dirs: &[PathBuf]) -> Vec<PlannedMove> {
        let mut buckets: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        for (i, file) in files.iter().enumerate() {
            let key = (
                file.classification.category.clone(),
                file.classification.subcategory.clone(),
            );
            buckets.entry(key).or_default().push(i);
        }

        let mut moves = Vec::new();

        for ((category, subcategory), indices) in buckets {
            let subcat_dir = root.join(&category).join(&subcategory);
            let items: Vec<GroupItem> = indices
                .iter()
                .map(|&i| GroupItem {
                    stem: files[i].stem.clone(),
                    modified: files[i].modified.map(to_local_date),
                })
                .collect();

            let partition = self.grouper.partition(&items);

            for group in &partition.groups {
                let group_dir = subcat_dir.join(&group.key);
                for &member in &group.members {
                    moves.push(PlannedMove {
                        source: files[indices[member]].path.clone(),
                        dest_dir: group_dir.clone(),
                        grouped: true,
                    });
                }
            }

            for &single in &partition.singletons {
                let file = &files[indices[single]];
                // A lone file still joins an existing group folder whose
                // name matches its base key, so new versions land next to
                // the ones grouped in earlier passes.
                let dest_dir = self
                    .adopting_group_dir(&subcat_dir, &file.stem)
                    .unwrap_or_else(|| subcat_dir.clone());
                let grouped = dest_dir != subcat_dir;
                moves.push(PlannedMove {
                    source: file.path.clone(),
                    dest_dir,
                    grouped,
                });
            }
        }

        if !dirs.is_empty() {
            moves.extend(self.plan_folder_moves(root, dirs));
        }

        moves
    }

    /// Loose top-level folders get the same grouping treatment under the
    /// Folders category.
    fn plan_folder_moves(&self, root: &Path, dirs: &[PathBuf]) -> Vec<PlannedMove> {
        let folders_dir = root.join(FOLDERS_CATEGORY);
        let items: Vec<GroupItem> = dirs
            .iter()
            .map(|dir| GroupItem {
                stem: dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                modified: fs::metadata(dir)
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(to_local_date),
            })
            .collect();

        let partition = self.grouper.partition(&items);
        let mut moves = Vec::new();

        for group in &partition.groups {
            let group_dir = folders_dir.join(&group.key);
            for &member in &group.members {
                moves.push(PlannedMove {
                    source: dirs[member].clone(),
                    dest_dir: group_dir.clone(),
                    grouped: true,
                });
            }
        }

        for &single in &partition.singletons {
            moves.push(PlannedMove {
                source: dirs[single].clone(),
                dest_dir: folders_dir.clone(),
                grouped: false,
            });
        }

        moves
    }

    /// An existing group directory under the subcategory whose name matches
    /// this stem's base key, if any.
    fn adopting_group_dir(&self, subcat_dir: &Path, stem: &str) -> Option<PathBuf> {
        let key = self.grouper.base_key(stem);
        if key.is_empty() {
            return None;
        }
        let entries = fs::read_dir(subcat_dir).ok()?;
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.to_lowercase() == key {
                    return Some(entry.path());
                }
            }
        }
        None
    }

    fn execute_move(
        &self,
        planned: &PlannedMove,
        moved: &mut HashSet<PathBuf>,
        report: &mut PassReport,
    ) {
        let Some(file_name) = planned.source.file_name() else {
            report.skipped += 1;
            return;
        };

        // Already exactly where it belongs: idempotence means hands off.
        if planned.source.parent() == Some(planned.dest_dir.as_path()) {
            return;
        }

        if self.dry_run {
            info!(
                from = %planned.source.display(),
                to = %planned.dest_dir.display(),
                "dry run: would move"
            );
            moved.insert(planned.source.clone());
            report.moved += 1;
            if planned.grouped {
                report.grouped += 1;
            }
            return;
        }

        if let Err(e) = fs::create_dir_all(&planned.dest_dir) {
            warn!(
                dir = %planned.dest_dir.display(),
                error = %e,
                "could not create destination, skipping file"
            );
            report.skipped += 1;
            return;
        }

        let dest = resolve_collision(&planned.dest_dir, Path::new(file_name));
        match fs::rename(&planned.source, &dest) {
            Ok(()) => {
                debug!(from = %planned.source.display(), to = %dest.display(), "moved");
                moved.insert(dest);
                report.moved += 1;
                if planned.grouped {
                    report.grouped += 1;
                }
            }
            Err(e) => {
                // The file may have vanished mid-pass; that is fine.
                warn!(
                    from = %planned.source.display(),
                    to = %dest.display(),
                    error = %e,
                    "move failed, skipping file"
                );
                report.skipped += 1;
            }
        }
    }

    /// Promote files idle beyond the threshold to the Review folder,
    /// keeping their path relative to the root so users can still navigate
    /// by category.
    fn review_sweep(
        &self,
        root: &Path,
        review_dir: &Path,
        moved: &HashSet<PathBuf>,
        report: &mut PassReport,
    ) {
        let now = SystemTime::now();
        let mut stale = Vec::new();
        self.collect_stale(root, review_dir, moved, now, &mut stale);
        stale.sort();

        for path in stale {
            if self.cancelled() {
                report.cancelled = true;
                break;
            }

            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let dest = review_dir.join(rel);

            if self.dry_run {
                info!(file = %path.display(), "dry run: would move to Review");
                report.reviewed += 1;
                continue;
            }

            let Some(dest_parent) = dest.parent() else {
                continue;
            };
            if let Err(e) = fs::create_dir_all(dest_parent) {
                warn!(dir = %dest_parent.display(), error = %e, "could not create Review path");
                report.skipped += 1;
                continue;
            }

            let Some(file_name) = dest.file_name() else {
                continue;
            };
            let dest = resolve_collision(dest_parent, Path::new(file_name));
            match fs::rename(&path, &dest) {
                Ok(()) => {
                    info!(from = %path.display(), to = %dest.display(), "moved to Review");
                    report.reviewed += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "review move failed, skipping");
                    report.skipped += 1;
                }
            }
        }
    }

    fn collect_stale(
        &self,
        dir: &Path,
        review_dir: &Path,
        moved: &HashSet<PathBuf>,
        now: SystemTime,
        stale: &mut Vec<PathBuf>,
    ) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                // The Manual name excludes at any depth; bundles move as
                // units so their internals are off limits too.
                if name == self.settings.organizer.manual_folder
                    || path == review_dir
                    || name.starts_with('.')
                    || name.ends_with(".app")
                {
                    continue;
                }
                self.collect_stale(&path, review_dir, moved, now, stale);
            } else if file_type.is_file() {
                if !self.filters.should_include(&path) || moved.contains(&path) {
                    continue;
                }
                let accessed = fs::metadata(&path).ok().and_then(|m| m.accessed().ok());
                if self.monitor.is_stale(accessed, now) {
                    stale.push(path);
                }
            }
        }
    }
}

/// Pick a destination path that does not collide with an existing file by
/// appending a numeric disambiguator before the extension. Never overwrites.
fn resolve_collision(dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn to_local_date(time: SystemTime) -> NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}
