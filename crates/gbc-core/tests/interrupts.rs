use gbc_core::bus::Bus;
use gbc_core::clock::Clock;
use gbc_core::cpu::Cpu;
use gbc_core::interrupts::{self, Interrupt};

fn setup() -> (Cpu, Bus, Clock) {
    let mut cpu = Cpu::new();
    cpu.pc = 0xC000;
    cpu.sp = 0xDFFE;
    cpu.ime = true;
    let mut bus = Bus::new(false);
    bus.write(0xFFFF, 0x1F);
    (cpu, bus, Clock::new())
}

#[test]
fn lowest_bit_is_serviced_first() {
    let (mut cpu, mut bus, mut clock) = setup();
    bus.write(0xFF0F, 0x1E);

    assert_eq!(interrupts::service(&mut cpu, &mut bus, &mut clock), Ok(20));
    assert_eq!(cpu.pc, Interrupt::LcdStat.vector());
    assert_eq!(bus.read(0xFF0F) & 0x1F, 0x1C);
    assert!(!cpu.ime);

    // IME is off until the handler re-enables it.
    assert_eq!(interrupts::service(&mut cpu, &mut bus, &mut clock), Ok(0));

    cpu.ime = true;
    interrupts::service(&mut cpu, &mut bus, &mut clock).unwrap();
    assert_eq!(cpu.pc, 0x50);
    assert_eq!(bus.read(0xFF0F) & 0x1F, 0x18);
    assert_eq!(clock.get(), 40);
}

#[test]
fn every_source_has_its_vector() {
    for interrupt in Interrupt::ALL {
        let (mut cpu, mut bus, mut clock) = setup();
        bus.request_interrupt(interrupt);
        interrupts::service(&mut cpu, &mut bus, &mut clock).unwrap();
        assert_eq!(cpu.pc, interrupt.vector());
        assert_eq!(bus.if_reg() & 0x1F, 0);
        assert_eq!(bus.read(0xDFFD), 0xC0);
        assert_eq!(bus.read(0xDFFC), 0x00);
    }
}

#[test]
fn halted_cpu_wakes_and_dispatches() {
    let (mut cpu, mut bus, mut clock) = setup();
    cpu.halted = true;
    bus.request_interrupt(Interrupt::Timer);
    assert_eq!(interrupts::service(&mut cpu, &mut bus, &mut clock), Ok(24));
    assert!(!cpu.halted);
    assert_eq!(cpu.pc, 0x50);
}
