use uuid::Uuid;

use crate::models::Habit;

/// Move one habit relative to another inside the subsequence selected by
/// `predicate`, leaving every non-matching element in its original slot.
///
/// Both positions are resolved within the filtered view only. Moving
/// forward drops the dragged element after the destination; moving
/// backward drops it before. When either id is missing from the filtered
/// view the input is returned unchanged.
pub fn move_within_filter<P>(
    habits: &[Habit],
    predicate: P,
    dragged: Uuid,
    destination: Uuid,
) -> Vec<Habit>
where
    P: Fn(&Habit) -> bool,
{
    let slots: Vec<usize> = habits
        .iter()
        .enumerate()
        .filter(|(_, h)| predicate(h))
        .map(|(idx, _)| idx)
        .collect();
    let mut filtered: Vec<Habit> = slots.iter().map(|&idx| habits[idx].clone()).collect();

    let Some(source_idx) = filtered.iter().position(|h| h.id == dragged) else {
        return habits.to_vec();
    };
    let Some(dest_idx) = filtered.iter().position(|h| h.id == destination) else {
        return habits.to_vec();
    };

    // Drop after the destination when moving down, before it when moving up.
    let insert_at = if dest_idx > source_idx {
        dest_idx + 1
    } else {
        dest_idx
    };

    let moved = filtered.remove(source_idx);
    let insert_at = if insert_at > source_idx {
        insert_at - 1
    } else {
        insert_at
    };
    filtered.insert(insert_at, moved);

    // Re-thread the reordered subsequence through its original slots so
    // the interleaving with non-matching elements is preserved exactly.
    let mut result = habits.to_vec();
    for (slot, habit) in slots.into_iter().zip(filtered) {
        result[slot] = habit;
    }
    result
}
