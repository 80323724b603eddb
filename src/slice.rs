use crate::record::BoundingBox;

#[derive(Debug, Clone)]
enum RecordSliceKind {
    Live,
    Slots(Vec<usize>),
}

/// View over a store's table, either every live record or a set of slots.
/// Tombstoned slots are skipped.
pub struct RecordSlice<'a> {
    table: &'a [Option<BoundingBox>],
    kind: RecordSliceKind,
}

impl<'a> Clone for RecordSlice<'a> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            kind: self.kind.clone(),
        }
    }
}

impl<'a> RecordSlice<'a> {
    pub(crate) fn live(table: &'a [Option<BoundingBox>]) -> Self {
        Self {
            table,
            kind: RecordSliceKind::Live,
        }
    }

    pub(crate) fn with_slots(table: &'a [Option<BoundingBox>], slots: Vec<usize>) -> Self {
        Self {
            table,
            kind: RecordSliceKind::Slots(slots),
        }
    }

    pub(crate) fn empty(table: &'a [Option<BoundingBox>]) -> Self {
        Self::with_slots(table, Vec::new())
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&'a BoundingBox> {
        match &self.kind {
            RecordSliceKind::Live => self.iter().nth(idx),
            RecordSliceKind::Slots(slots) => self.table.get(*slots.get(idx)?)?.as_ref(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.kind {
            RecordSliceKind::Live => self.table.iter().flatten().count(),
            RecordSliceKind::Slots(slots) => slots.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slots(&self) -> Vec<usize> {
        match &self.kind {
            RecordSliceKind::Live => self.iter().filter_map(BoundingBox::slot).collect(),
            RecordSliceKind::Slots(slots) => slots.clone(),
        }
    }

    pub fn iter(&self) -> RecordSliceIter<'a> {
        self.clone().into_iter()
    }
}

pub enum RecordSliceIter<'a> {
    Live(std::iter::Flatten<std::slice::Iter<'a, Option<BoundingBox>>>),
    Slots((&'a [Option<BoundingBox>], std::vec::IntoIter<usize>)),
}

impl<'a> Iterator for RecordSliceIter<'a> {
    type Item = &'a BoundingBox;

    fn next(&mut self) -> Option<&'a BoundingBox> {
        match self {
            RecordSliceIter::Live(it) => it.next(),
            RecordSliceIter::Slots((table, it)) => {
                let table: &'a [Option<BoundingBox>] = *table;

                loop {
                    if let Some(rec) = table.get(it.next()?).and_then(Option::as_ref) {
                        return Some(rec);
                    }
                }
            }
        }
    }
}

impl<'a> IntoIterator for RecordSlice<'a> {
    type Item = &'a BoundingBox;
    type IntoIter = RecordSliceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        match self.kind {
            RecordSliceKind::Live => RecordSliceIter::Live(self.table.iter().flatten()),
            RecordSliceKind::Slots(slots) => {
                RecordSliceIter::Slots((self.table, slots.into_iter()))
            }
        }
    }
}

impl<'a, 'b> IntoIterator for &'b RecordSlice<'a> {
    type Item = &'a BoundingBox;
    type IntoIter = RecordSliceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
