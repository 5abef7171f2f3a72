//! Similarity grouping: clustering files within one subcategory so related
//! files land in a shared subfolder.
//!
//! Filenames are first reduced to a "base key" (extension, copy counters,
//! version suffixes, date stamps, and separators stripped). Two files belong
//! together when their base keys match exactly, when the keys are within a
//! configured edit distance, or when the files were modified on the same
//! calendar day and their keys share a long enough prefix. Name similarity
//! takes priority over date matching: a file already claimed by a name
//! cluster is never pulled into a date group.
//!
//! The partition is computed from a sorted snapshot with union-find, so the
//! result is identical for every input ordering of the same file set.

use chrono::NaiveDate;
use regex::Regex;

use crate::config::GroupingSettings;

/// One file (or folder) offered to the grouper: the name without extension
/// and the modification date, when known.
#[derive(Debug, Clone)]
pub struct GroupItem {
    pub stem: String,
    pub modified: Option<NaiveDate>,
}

/// A named cluster of input indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Folder name for the cluster: the shortest base key among members,
    /// or `YYYY-MM-DD` for clusters formed by date alone.
    pub key: String,
    /// Indices into the input slice, ordered by stem.
    pub members: Vec<usize>,
    /// True when the cluster was formed by the date rule.
    pub by_date: bool,
}

/// The outcome of partitioning one subcategory.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Clusters that get their own subfolder, ordered by key.
    pub groups: Vec<Group>,
    /// Indices placed directly under the subcategory folder, no nesting.
    pub singletons: Vec<usize>,
}

/// Partitions files of one subcategory into similarity clusters.
pub struct Grouper {
    max_edits: usize,
    min_prefix_len: usize,
    min_group_size: usize,
    copy_counter: Regex,
    version_suffix: Regex,
    date_stamp: Regex,
    modifiers: Regex,
    trailing_digits: Regex,
    separators: Regex,
}

impl Grouper {
    pub fn new(settings: &GroupingSettings) -> Self {
        Self {
            max_edits: settings.max_edits,
            min_prefix_len: settings.min_prefix_len,
            min_group_size: settings.min_group_size.max(1),
            copy_counter: Regex::new(r"\s*\(\d+\)$").expect("static regex"),
            version_suffix: Regex::new(r"(?i)[\s_\-]v\d+(\.\d+)*").expect("static regex"),
            date_stamp: Regex::new(r"(20\d{2}[-_]?\d{2}[-_]?\d{2}|\d{2}[-_]?\d{2}[-_]?20\d{2}|\d{8})")
                .expect("static regex"),
            modifiers: Regex::new(r"(?i)( - copy| copy| final| draft| new)").expect("static regex"),
            trailing_digits: Regex::new(r"[\s_\-]*\d+$").expect("static regex"),
            separators: Regex::new(r"[\s_\-.]+").expect("static regex"),
        }
    }

    /// Reduce a file stem to its base key.
    ///
    /// Strips a trailing ` (N)` copy counter, `vN`/`vN.N` version markers,
    /// embedded date stamps, common copy/draft modifiers and trailing digit
    /// runs, then collapses separators and lowercases. The key may end up
    /// empty (e.g. for purely numeric names); empty keys never match
    /// anything by name.
    pub fn base_key(&self, stem: &str) -> String {
        let key = self.copy_counter.replace_all(stem, "");
        let key = self.version_suffix.replace_all(&key, "");
        let key = self.date_stamp.replace_all(&key, "");
        let key = self.modifiers.replace_all(&key, "");
        let key = self.trailing_digits.replace_all(&key, "");
        let key = self.separators.replace_all(&key, " ");
        key.trim().to_lowercase()
    }

    /// Partition one subcategory's entries into groups and singletons.
    ///
    /// Clusters smaller than `min_group_size` are reported as singletons so
    /// lone files sit directly under the subcategory folder without a
    /// needless extra directory level.
    pub fn partition(&self, items: &[GroupItem]) -> Partition {
        let n = items.len();
        let keys: Vec<String> = items.iter().map(|item| self.base_key(&item.stem)).collect();

        let mut clusters = UnionFind::new(n);

        // Name rules: exact base key match, or fuzzy match within the edit
        // budget. Fuzzy matching requires both keys to carry enough signal,
        // otherwise short names ("a" vs "b") would all collapse together.
        for i in 0..n {
            if keys[i].is_empty() {
                continue;
            }
            for j in (i + 1)..n {
                if keys[j].is_empty() {
                    continue;
                }
                let exact = keys[i] == keys[j];
                let fuzzy = keys[i].chars().count() >= self.min_prefix_len
                    && keys[j].chars().count() >= self.min_prefix_len
                    && levenshtein(&keys[i], &keys[j]) < self.max_edits;
                if exact || fuzzy {
                    clusters.union(i, j);
                }
            }
        }

        let name_cluster_sizes = clusters.sizes();

        // Date rule, only for entries the name rules left alone: same
        // calendar day and a shared prefix of at least min_prefix_len.
        let mut date_links = UnionFind::new(n);
        let candidates: Vec<usize> = (0..n)
            .filter(|&i| {
                name_cluster_sizes[clusters.find(i)] < self.min_group_size.max(2)
                    && items[i].modified.is_some()
                    && !keys[i].is_empty()
            })
            .collect();

        for (a, &i) in candidates.iter().enumerate() {
            for &j in &candidates[a + 1..] {
                if items[i].modified == items[j].modified
                    && common_prefix_len(&keys[i], &keys[j]) >= self.min_prefix_len
                {
                    date_links.union(i, j);
                }
            }
        }

        // Assemble: name clusters first, then date clusters, then leftovers.
        let mut assigned = vec![false; n];
        let mut groups = Vec::new();

        for cluster in clusters.clusters() {
            if cluster.len() < self.min_group_size {
                continue;
            }
            let key = shortest_key(&cluster, &keys);
            let members = sorted_by_stem(cluster, items);
            for &m in &members {
                assigned[m] = true;
            }
            groups.push(Group {
                key,
                members,
                by_date: false,
            });
        }

        for cluster in date_links.clusters() {
            let cluster: Vec<usize> = cluster.into_iter().filter(|&i| !assigned[i]).collect();
            if cluster.len() < self.min_group_size {
                continue;
            }
            // All members share the same modification day by construction.
            let Some(day) = items[cluster[0]].modified else {
                continue;
            };
            let members = sorted_by_stem(cluster, items);
            for &m in &members {
                assigned[m] = true;
            }
            groups.push(Group {
                key: day.format("%Y-%m-%d").to_string(),
                members,
                by_date: true,
            });
        }

        groups.sort_by(|a, b| a.key.cmp(&b.key));

        let singletons = sorted_by_stem((0..n).filter(|&i| !assigned[i]).collect(), items);

        Partition { groups, singletons }
    }
}

/// Classic Levenshtein edit distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Shortest non-empty base key in the cluster, ties broken lexicographically.
fn shortest_key(cluster: &[usize], keys: &[String]) -> String {
    cluster
        .iter()
        .map(|&i| keys[i].as_str())
        .filter(|k| !k.is_empty())
        .min_by(|a, b| a.len().cmp(&b.len()).then(a.cmp(b)))
        .unwrap_or_default()
        .to_string()
}

fn sorted_by_stem(mut indices: Vec<usize>, items: &[GroupItem]) -> Vec<usize> {
    indices.sort_by(|&a, &b| items[a].stem.cmp(&items[b].stem).then(a.cmp(&b)));
    indices
}

/// Minimal union-find with path compression, enough for pass-sized inputs.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&self, mut i: usize) -> usize {
        while self.parent[i] != i {
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower root wins so the structure is input-order independent.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }

    fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.parent.len()];
        for i in 0..self.parent.len() {
            sizes[self.find(i)] += 1;
        }
        sizes
    }

    fn clusters(&self) -> Vec<Vec<usize>> {
        let mut by_root: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
        for i in 0..self.parent.len() {
            by_root.entry(self.find(i)).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouper() -> Grouper {
        Grouper::new(&GroupingSettings::default())
    }

    fn item(stem: &str) -> GroupItem {
        GroupItem {
            stem: stem.to_string(),
            modified: None,
        }
    }

    fn dated(stem: &str, day: &str) -> GroupItem {
        GroupItem {
            stem: stem.to_string(),
            modified: Some(day.parse().expect("valid date")),
        }
    }

    #[test]
    fn test_base_key_strips_versions_and_counters() {
        let g = grouper();
        assert_eq!(g.base_key("report_v1"), "report");
        assert_eq!(g.base_key("report_v2.3"), "report");
        assert_eq!(g.base_key("Invoice (2)"), "invoice");
        assert_eq!(g.base_key("photo copy"), "photo");
        assert_eq!(g.base_key("Meeting Notes final"), "meeting notes");
    }

    #[test]
    fn test_base_key_strips_dates_and_trailing_digits() {
        let g = grouper();
        assert_eq!(g.base_key("scan 2024-01-05"), "scan");
        assert_eq!(g.base_key("IMG_20240105_123456"), "img");
        assert_eq!(g.base_key("IMG_1234"), "img");
    }

    #[test]
    fn test_base_key_can_be_empty() {
        let g = grouper();
        assert_eq!(g.base_key("12345"), "");
        assert_eq!(g.base_key("(1)"), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("report", "reports"), 1);
    }

    #[test]
    fn test_versions_group_together() {
        let g = grouper();
        let items = vec![item("report_v1"), item("report_v2"), item("budget")];
        let p = g.partition(&items);

        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].key, "report");
        assert_eq!(p.groups[0].members, vec![0, 1]);
        assert!(!p.groups[0].by_date);
        assert_eq!(p.singletons, vec![2]);
    }

    #[test]
    fn test_fuzzy_match_within_edit_budget() {
        let g = grouper();
        let items = vec![item("holiday plan"), item("holiday plans"), item("taxes")];
        let p = g.partition(&items);

        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].members, vec![0, 1]);
    }

    #[test]
    fn test_short_names_never_fuzzy_match() {
        let g = grouper();
        let items = vec![item("cat"), item("car"), item("cab")];
        let p = g.partition(&items);

        assert!(p.groups.is_empty());
        assert_eq!(p.singletons.len(), 3);
    }

    #[test]
    fn test_date_grouping_requires_shared_prefix() {
        let g = grouper();
        let items = vec![
            dated("trip photos alps", "2024-03-10"),
            dated("trip planning", "2024-03-10"),
            dated("unrelated memo", "2024-03-10"),
        ];
        let p = g.partition(&items);

        assert_eq!(p.groups.len(), 1);
        let group = &p.groups[0];
        assert_eq!(group.key, "2024-03-10");
        assert!(group.by_date);
        assert_eq!(group.members, vec![0, 1]);
        assert_eq!(p.singletons, vec![2]);
    }

    #[test]
    fn test_name_match_takes_priority_over_date() {
        let g = grouper();
        let items = vec![
            dated("report_v1", "2024-03-10"),
            dated("report_v2", "2024-03-10"),
            dated("reptile care", "2024-03-10"),
        ];
        let p = g.partition(&items);

        // The versions form a name group; the third file shares their day
        // and a prefix but may not drag them into a date group, and alone it
        // cannot form one.
        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].key, "report");
        assert!(!p.groups[0].by_date);
        assert_eq!(p.singletons, vec![2]);
    }

    #[test]
    fn test_numeric_only_names_stay_apart() {
        let g = grouper();
        let items = vec![item("12345"), item("67890")];
        let p = g.partition(&items);

        assert!(p.groups.is_empty());
        assert_eq!(p.singletons.len(), 2);
    }

    #[test]
    fn test_partition_is_order_independent() {
        let g = grouper();
        let forward = vec![
            dated("report_v1", "2024-03-10"),
            dated("report_v2", "2024-03-10"),
            item("budget 2023"),
            dated("trip photos", "2024-05-01"),
            dated("trip plan", "2024-05-01"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let p1 = g.partition(&forward);
        let p2 = g.partition(&reversed);

        let names = |p: &Partition, items: &[GroupItem]| -> Vec<(String, Vec<String>)> {
            p.groups
                .iter()
                .map(|group| {
                    (
                        group.key.clone(),
                        group
                            .members
                            .iter()
                            .map(|&i| items[i].stem.clone())
                            .collect(),
                    )
                })
                .collect()
        };

        assert_eq!(names(&p1, &forward), names(&p2, &reversed));
    }

    #[test]
    fn test_group_key_is_shortest_base_key() {
        let g = grouper();
        let items = vec![item("invoices_acme_v1"), item("invoice acme")];
        let p = g.partition(&items);

        // Keys are "invoices acme" and "invoice acme", one edit apart.
        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[0].key, "invoice acme");
    }
}
