//! Fixed-size row grouping for grid layouts.

use std::ops::Deref;

use shared::{
    domain::{CategoryId, MemberRole},
    protocol::{Category, ClubMember},
};

/// One row of a grid. Every bucket but the last of a sequence is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<T> {
    items: Vec<T>,
}

impl<T> Bucket<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Bucket<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> IntoIterator for Bucket<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Splits `items` into consecutive buckets of `bucket_size`, preserving order.
/// A size of zero is treated as one.
pub fn bucketize<T: Clone>(items: &[T], bucket_size: usize) -> Vec<Bucket<T>> {
    items
        .chunks(bucket_size.max(1))
        .map(|chunk| Bucket {
            items: chunk.to_vec(),
        })
        .collect()
}

/// How many items of `item_width` plus `gap` fit into `available`, at least one.
pub fn per_row(available: u32, item_width: u32, gap: u32) -> usize {
    let slot = item_width.saturating_add(gap);
    if slot == 0 {
        return 1;
    }
    ((available / slot) as usize).max(1)
}

/// Club members split by role for the club home screen.
///
/// The master is a single-item category and never goes through the bucketizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberRoster {
    pub master: Option<ClubMember>,
    pub managers: Vec<Bucket<ClubMember>>,
    pub members: Vec<Bucket<ClubMember>>,
}

impl MemberRoster {
    pub fn split(members: &[ClubMember], per_row: usize) -> Self {
        let mut master = None;
        let mut managers = Vec::new();
        let mut plain = Vec::new();

        for member in members {
            match member.member_role() {
                Some(MemberRole::Master) if master.is_none() => master = Some(member.clone()),
                Some(MemberRole::Master) => {
                    tracing::warn!(user_id = member.id.0, "roster: second master listed");
                    managers.push(member.clone());
                }
                Some(MemberRole::Manager) => managers.push(member.clone()),
                Some(MemberRole::Member) => plain.push(member.clone()),
                None => {}
            }
        }

        Self {
            master,
            managers: bucketize(&managers, per_row),
            members: bucketize(&plain, per_row),
        }
    }

    pub fn total(&self) -> usize {
        let bucketed: usize = self
            .managers
            .iter()
            .chain(self.members.iter())
            .map(|bucket| bucket.len())
            .sum();
        bucketed + usize::from(self.master.is_some())
    }
}

/// The synthetic entry the club list shows ahead of the server's categories.
pub fn all_category() -> Category {
    Category {
        id: CategoryId(0),
        name: "All".to_string(),
        description: "All Category".to_string(),
        thumbnail: None,
        order: None,
    }
}

/// Category picker pages, optionally led by [`all_category`].
pub fn category_pages(
    categories: &[Category],
    page_size: usize,
    include_all: bool,
) -> Vec<Bucket<Category>> {
    if include_all {
        let mut with_all = Vec::with_capacity(categories.len() + 1);
        with_all.push(all_category());
        with_all.extend_from_slice(categories);
        bucketize(&with_all, page_size)
    } else {
        bucketize(categories, page_size)
    }
}
