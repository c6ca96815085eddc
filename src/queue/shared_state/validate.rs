//! ### English
//! Consistency walker over the slot sets, run after every mutation when enabled.
//!
//! ### 中文
//! 针对槽位集合的一致性检查，启用时在每次修改后运行。

use std::sync::Arc;

use super::CoreState;
use crate::queue::NUM_BUFFER_SLOTS;

impl CoreState {
    /// ### English
    /// Describes every broken invariant; empty when the state is consistent.
    ///
    /// ### 中文
    /// 描述所有被破坏的不变量；状态一致时返回空列表。
    pub(crate) fn consistency_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let mut memberships = [0u8; NUM_BUFFER_SLOTS];
        for &slot in &self.free_slots {
            memberships[slot] += 1;
        }
        for &slot in &self.free_buffers {
            memberships[slot] += 1;
        }
        for &slot in &self.unused_slots {
            memberships[slot] += 1;
        }
        for &slot in &self.active_buffers {
            memberships[slot] += 1;
        }

        for (slot, entry) in self.slots.iter().enumerate() {
            if memberships[slot] != 1 {
                violations.push(format!("slot {slot} is in {} slot sets", memberships[slot]));
            }
            let state = &entry.buffer_state;
            let has_buffer = entry.graphic_buffer.is_some();

            if self.unused_slots.contains(&slot) {
                if !state.is_free() || has_buffer {
                    violations.push(format!("unused slot {slot} is {} or holds a buffer", state.label()));
                }
                continue;
            }

            if state.is_free() && !state.is_shared() {
                if has_buffer && !self.free_buffers.contains(&slot) {
                    violations.push(format!("free slot {slot} with a buffer is not in free_buffers"));
                }
                if !has_buffer && !self.free_slots.contains(&slot) {
                    violations.push(format!("free slot {slot} without a buffer is not in free_slots"));
                }
            } else if !self.active_buffers.contains(&slot) {
                violations.push(format!("{} slot {slot} is not in active_buffers", state.label()));
            }
        }

        let dequeued = self.dequeued_count();
        if dequeued > self.max_dequeued_buffer_count {
            violations.push(format!(
                "{dequeued} dequeued buffers exceed max {}",
                self.max_dequeued_buffer_count
            ));
        }
        let acquired = self.acquired_count();
        if acquired > self.max_acquired_buffer_count + 1 {
            violations.push(format!(
                "{acquired} acquired buffers exceed max {} + 1",
                self.max_acquired_buffer_count
            ));
        }

        let shared: Vec<usize> = (0..NUM_BUFFER_SLOTS)
            .filter(|&slot| self.slots[slot].buffer_state.is_shared())
            .collect();
        if shared.len() > 1 {
            violations.push(format!("several shared slots: {shared:?}"));
        }
        if let Some(slot) = self.shared_buffer_slot {
            if !self.slots[slot].buffer_state.is_shared() {
                violations.push(format!("latched shared slot {slot} lacks the shared flag"));
            }
            if self.free_buffers.contains(&slot) || self.free_slots.contains(&slot) {
                violations.push(format!("latched shared slot {slot} sits on a free list"));
            }
        }

        let mut previous_frame = 0;
        for item in &self.queue {
            if item.frame_number <= previous_frame || item.frame_number > self.frame_counter {
                violations.push(format!(
                    "queued frame {} out of order (previous {previous_frame}, counter {})",
                    item.frame_number, self.frame_counter
                ));
            }
            previous_frame = item.frame_number;
            if item.is_stale {
                continue;
            }
            let Some(slot) = item.slot.filter(|&slot| slot < NUM_BUFFER_SLOTS) else {
                violations.push(format!("queued frame {} has no slot", item.frame_number));
                continue;
            };
            let entry = &self.slots[slot];
            if !self.active_buffers.contains(&slot) || !entry.buffer_state.is_queued() {
                violations.push(format!(
                    "queued frame {} points at {} slot {slot}",
                    item.frame_number,
                    entry.buffer_state.label()
                ));
            }
            let same_buffer = match (&item.graphic_buffer, &entry.graphic_buffer) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if !same_buffer {
                violations.push(format!(
                    "queued frame {} does not hold slot {slot}'s buffer",
                    item.frame_number
                ));
            }
        }

        let budget = NUM_BUFFER_SLOTS - self.unused_slots.len();
        if budget != self.max_buffer_count() {
            violations.push(format!(
                "{budget} slots in use but the budget is {}",
                self.max_buffer_count()
            ));
        }

        violations
    }
}
