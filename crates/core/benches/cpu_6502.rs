use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vcs_core::cpu_6502::{Cpu6502, Memory6502};

/// Flat RAM bus for benchmarking the dispatch loop.
struct BenchMemory {
    ram: Vec<u8>,
}

impl BenchMemory {
    fn new() -> Self {
        let mut ram = vec![0; 0x10000];

        ram[0xFFFC] = 0x00;
        ram[0xFFFD] = 0x80;

        // A mixed-instruction loop at $8000:
        //   LDA #$42 ; STA $2000 ; LDX #$10 ; LDY #$20
        //   INX ; INY ; DEX ; DEY ; ADC #$01 ; JMP $8000
        let program = [
            0xA9, 0x42, 0x8D, 0x00, 0x20, 0xA2, 0x10, 0xA0, 0x20, 0xE8, 0xC8, 0xCA, 0x88, 0x69,
            0x01, 0x4C, 0x00, 0x80,
        ];
        ram[0x8000..0x8000 + program.len()].copy_from_slice(&program);

        Self { ram }
    }
}

impl Memory6502 for BenchMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.ram[addr as usize] = val;
    }
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("cpu_6502_steps", |b| {
        let mut cpu = Cpu6502::new(BenchMemory::new());
        cpu.reset();
        b.iter(|| {
            for _ in 0..1000 {
                cpu.step().unwrap();
            }
            black_box(cpu.a);
        });
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
