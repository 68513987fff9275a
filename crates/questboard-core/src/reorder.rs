//! Local order mutations
//!
//! A move removes the dragged item from its slot and reinserts it at the
//! destination, an O(n) array move. Every other item keeps its relative
//! order. The affected groups are renumbered densely from 1 afterwards, so a
//! mutated list sorts exactly like a list fetched from the authority.

use std::collections::HashSet;

use crate::traits::Result;
use questboard_api::{ApiError, MoveTarget, OrderableItem, PositionEntry, ReorderRequest};

/// The optimistic list after a move, plus the request that persists it.
#[derive(Debug, Clone)]
pub struct MovePlan<T: OrderableItem> {
    pub items: Vec<T>,
    pub request: ReorderRequest<T::Group>,
}

/// Deterministic display order: group, then position, then id.
pub fn sort_items<T: OrderableItem>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.group()
            .cmp(b.group())
            .then_with(|| a.position().cmp(&b.position()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

pub fn group_members<'a, T: OrderableItem>(
    items: &'a [T],
    group: &'a T::Group,
) -> impl Iterator<Item = &'a T> + 'a {
    items.iter().filter(move |item| item.group() == group)
}

/// Group and zero-based index within that group.
pub fn slot_of<T: OrderableItem>(items: &[T], id: &str) -> Option<(T::Group, usize)> {
    let item = items.iter().find(|item| item.id() == id)?;
    let index = group_members(items, item.group()).position(|member| member.id() == id)?;
    Some((item.group().clone(), index))
}

pub fn renumber_group<T: OrderableItem>(items: &mut [T], group: &T::Group) {
    let mut position = 1;
    for item in items.iter_mut().filter(|item| item.group() == group) {
        item.set_position(position);
        position += 1;
    }
}

struct Relocation<T: OrderableItem> {
    items: Vec<T>,
    origin_group: T::Group,
    slot: usize,
}

fn relocate<T: OrderableItem>(
    items: &[T],
    id: &str,
    target: &MoveTarget<T::Group>,
) -> Result<Option<Relocation<T>>> {
    let (origin_group, origin_index) =
        slot_of(items, id).ok_or_else(|| ApiError::item_not_found(id))?;
    let from = items
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| ApiError::item_not_found(id))?;

    let mut next = items.to_vec();
    let mut moving = next.remove(from);

    let members: Vec<usize> = next
        .iter()
        .enumerate()
        .filter(|(_, item)| item.group() == &target.group)
        .map(|(index, _)| index)
        .collect();
    let slot = target.index.unwrap_or(members.len()).min(members.len());

    if origin_group == target.group && slot == origin_index {
        return Ok(None);
    }

    let insert_at = match (members.get(slot), members.last()) {
        (Some(&index), _) => index,
        (None, Some(&last)) => last + 1,
        // Empty destination group: keep groups in sort order
        (None, None) => next
            .iter()
            .position(|item| item.group() > &target.group)
            .unwrap_or(next.len()),
    };

    moving.set_group(target.group.clone());
    next.insert(insert_at, moving);
    renumber_group(&mut next, &target.group);
    if origin_group != target.group {
        renumber_group(&mut next, &origin_group);
    }

    Ok(Some(Relocation {
        items: next,
        origin_group,
        slot,
    }))
}

/// Compute the list after dropping `id` on `target`.
///
/// Returns `Ok(None)` when the drop lands on the item's own slot. Indexes past
/// the end of the destination group clamp to an append.
pub fn plan_move<T: OrderableItem>(
    items: &[T],
    id: &str,
    target: &MoveTarget<T::Group>,
) -> Result<Option<MovePlan<T>>> {
    let Some(relocation) = relocate(items, id, target)? else {
        return Ok(None);
    };

    let request = if relocation.origin_group == target.group {
        ReorderRequest::Positions {
            entries: group_members(&relocation.items, &target.group)
                .map(|item| PositionEntry {
                    id: item.id().to_string(),
                    position: item.position(),
                })
                .collect(),
        }
    } else {
        ReorderRequest::MoveToGroup {
            id: id.to_string(),
            group: target.group.clone(),
            index: relocation.slot,
        }
    };

    Ok(Some(MovePlan {
        items: relocation.items,
        request,
    }))
}

/// Apply a reorder request the way the authority does.
///
/// The list is left untouched when the request is rejected.
pub fn apply_request<T: OrderableItem>(
    items: &mut Vec<T>,
    request: &ReorderRequest<T::Group>,
) -> Result<()> {
    match request {
        ReorderRequest::Positions { entries } => {
            let mut seen = HashSet::new();
            for entry in entries {
                if !seen.insert(entry.id.as_str()) {
                    return Err(ApiError::invalid(format!(
                        "Duplicate item in reorder request: {}",
                        entry.id
                    )));
                }
                if !items.iter().any(|item| item.id() == entry.id) {
                    return Err(ApiError::item_not_found(&entry.id));
                }
            }

            for entry in entries {
                if let Some(item) = items.iter_mut().find(|item| item.id() == entry.id) {
                    item.set_position(entry.position);
                }
            }
            sort_items(items);
            Ok(())
        }
        ReorderRequest::MoveToGroup { id, group, index } => {
            let target = MoveTarget::at(group.clone(), *index);
            if let Some(relocation) = relocate(items, id, &target)? {
                *items = relocation.items;
            }
            Ok(())
        }
    }
}
