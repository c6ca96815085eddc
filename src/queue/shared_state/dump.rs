use std::fmt::Write;

use super::CoreState;

impl CoreState {
    /// ### English
    /// Human-readable snapshot of the core: settings, pending queue and every slot that is not unused.
    ///
    /// ### 中文
    /// 核心的可读快照：设置项、待处理队列以及所有非 unused 槽位。
    pub(crate) fn dump(&self, prefix: &str) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_dump(&mut out, prefix);
        out
    }

    fn write_dump(&self, out: &mut String, prefix: &str) -> std::fmt::Result {
        writeln!(
            out,
            "{prefix}[{}] max_buffer_count={} max_acquired={} max_dequeued={} async={} cannot_block={}",
            self.consumer_name,
            self.max_buffer_count,
            self.max_acquired_buffer_count,
            self.max_dequeued_buffer_count,
            self.async_mode,
            self.dequeue_buffer_cannot_block,
        )?;
        writeln!(
            out,
            "{prefix}default={}x{} format={:?} data_space={:?} usage={:#x} transform_hint={:#x} frame_counter={} generation={}",
            self.default_size.width,
            self.default_size.height,
            self.default_format,
            self.default_data_space,
            self.consumer_usage_bits.bits(),
            self.transform_hint,
            self.frame_counter,
            self.generation_number,
        )?;
        writeln!(
            out,
            "{prefix}connected_api={:?} abandoned={} shared_mode={} auto_refresh={} shared_slot={:?}",
            self.connected_api,
            self.is_abandoned,
            self.shared_buffer_mode,
            self.auto_refresh,
            self.shared_buffer_slot,
        )?;

        writeln!(out, "{prefix}pending queue ({}):", self.queue.len())?;
        for item in &self.queue {
            writeln!(
                out,
                "{prefix}  slot={:?} frame={} timestamp={}{} crop=[{} {} {} {}] transform={:#x} scaling={:?} droppable={}{}",
                item.slot,
                item.frame_number,
                item.timestamp,
                if item.is_auto_timestamp { " (auto)" } else { "" },
                item.crop.left,
                item.crop.top,
                item.crop.right,
                item.crop.bottom,
                item.transform.bits(),
                item.scaling_mode,
                item.droppable,
                if item.is_stale { " stale" } else { "" },
            )?;
        }

        writeln!(
            out,
            "{prefix}free_slots={:?} free_buffers={:?} unused={}",
            self.free_slots,
            self.free_buffers,
            self.unused_slots.len()
        )?;
        for (slot, entry) in self.slots.iter().enumerate() {
            if self.unused_slots.contains(&slot) {
                continue;
            }
            let marker = if self.last_queued_slot == Some(slot) { ">" } else { " " };
            write!(
                out,
                "{prefix} {marker}[{slot:02}] state={:<8} frame={}",
                entry.buffer_state.label(),
                entry.frame_number,
            )?;
            match &entry.graphic_buffer {
                Some(buffer) => writeln!(
                    out,
                    " buffer={:?} {}x{}:{} format={:?} usage={:#x}",
                    buffer.id(),
                    buffer.width(),
                    buffer.height(),
                    buffer.stride(),
                    buffer.format(),
                    buffer.usage().bits(),
                )?,
                None => writeln!(out)?,
            }
        }
        Ok(())
    }
}
