//! Pending-interrupt latches sampled by the main CPU at instruction
//! boundaries via `wdc65816::Bus::take_pending_nmi`/`take_pending_irq`.
//!
//! Kept as its own small struct (rather than fields directly on `bus::Bus`)
//! because both the timer (NMI on V-blank start, IRQ from H/V counter match)
//! and DMA-adjacent register writes (`NMITIMEN`'s late-enable quirk) need to
//! raise these independently of which component last touched the bus.

#[derive(Debug, Default)]
pub struct InterruptFlags {
    nmi: bool,
    irq: bool,
}

impl InterruptFlags {
    pub fn raise_nmi(&mut self) {
        self.nmi = true;
    }

    pub fn raise_irq(&mut self) {
        self.irq = true;
    }

    pub fn clear_irq(&mut self) {
        self.irq = false;
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi
    }

    pub fn irq_pending(&self) -> bool {
        self.irq
    }

    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi)
    }

    pub fn take_irq(&mut self) -> bool {
        // IRQ stays pending until the bus-visible IRQ condition itself
        // clears (timer match, HVBJOY poll) unlike NMI's one-shot latch; the
        // caller clears it via `clear_irq` once the underlying condition is
        // gone. `take_irq` only reports the current level.
        self.irq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nmi_latch_is_one_shot() {
        let mut flags = InterruptFlags::default();
        flags.raise_nmi();
        assert!(flags.take_nmi());
        assert!(!flags.take_nmi());
    }

    #[test]
    fn irq_is_level_sensitive_until_explicitly_cleared() {
        let mut flags = InterruptFlags::default();
        flags.raise_irq();
        assert!(flags.take_irq());
        assert!(flags.take_irq());
        flags.clear_irq();
        assert!(!flags.take_irq());
    }
}
