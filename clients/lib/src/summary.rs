/// What a successful copy did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files_copied: usize,
    pub directories_created: usize,
    /// Logical bytes of the copied files
    pub bytes_copied: u64,
    /// Part of `bytes_copied` that was reconstructed as holes
    pub bytes_skipped_as_holes: u64,
    /// Stale destination entries removed before copying
    pub entries_removed: usize,
}

impl std::ops::Add for CopySummary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            bytes_copied: self.bytes_copied + other.bytes_copied,
            bytes_skipped_as_holes: self.bytes_skipped_as_holes + other.bytes_skipped_as_holes,
            entries_removed: self.entries_removed + other.entries_removed,
        }
    }
}

impl std::ops::AddAssign for CopySummary {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
