use crate::common::{create_cpu_client, matmul, random_matrix};
use crate::helpers::{assert_parity_f64, canonical_rows, with_cuda_backend};
use densolve::algorithm::linalg::{DecompositionAlgorithms, QrMode};
use densolve::dtype::DType;
use densolve::runtime::cpu::CpuRuntime;
use densolve::runtime::cuda::CudaRuntime;
use densolve::runtime::{Allocator, RuntimeClient};
use densolve::tensor::Tensor;

const SHAPES: [(usize, usize); 4] = [(4, 3), (3, 5), (6, 6), (1, 4)];

#[test]
fn test_qr_r_parity() {
    let (cpu_client, _) = create_cpu_client();
    let cases: Vec<_> = SHAPES
        .iter()
        .enumerate()
        .map(|(seed, &(m, n))| {
            let data = random_matrix(m, n, 50 + seed as u64);
            let a = Tensor::<CpuRuntime>::from_slice(&data, &[m, n], &cpu_client);
            let r = cpu_client.qr(&a, QrMode::R, None).unwrap().into_single().unwrap();
            (m, n, data, canonical_rows(&r.to_vec::<f64>(), m.min(n), n))
        })
        .collect();

    with_cuda_backend(|cuda_client, _| {
        for (m, n, data, cpu_r) in &cases {
            let a = Tensor::<CudaRuntime>::from_slice(data, &[*m, *n], &cuda_client);
            let r = cuda_client.qr(&a, QrMode::R, None).unwrap().into_single().unwrap();
            assert_eq!(r.shape(), &[m.min(*n), *n]);
            let cuda_r = canonical_rows(&r.to_vec::<f64>(), m.min(*n), *n);
            assert_parity_f64(cpu_r, &cuda_r, 1e-10, 1e-10, &format!("qr_r_{m}x{n}"));
        }
    });
}

#[test]
fn test_qr_factor_modes_reconstruct_on_device() {
    with_cuda_backend(|cuda_client, _| {
        for (seed, &(m, n)) in SHAPES.iter().enumerate() {
            let data = random_matrix(m, n, 60 + seed as u64);
            let a = Tensor::<CudaRuntime>::from_slice(&data, &[m, n], &cuda_client);
            for mode in [QrMode::Reduced, QrMode::Complete] {
                let (q, r) = cuda_client.qr(&a, mode, None).unwrap().into_pair().unwrap();
                let (qm, qc) = (q.shape()[0], q.shape()[1]);
                let qr = matmul(&q.to_vec::<f64>(), &r.to_vec::<f64>(), qm, qc, n);
                assert_parity_f64(&qr, &data, 0.0, 1e-10, &format!("qr_{mode}_{m}x{n}"));
            }
        }
    });
}

#[test]
fn test_qr_raw_shapes_and_release() {
    with_cuda_backend(|cuda_client, _| {
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let a = Tensor::<CudaRuntime>::from_slice(&data, &[2, 3], &cuda_client);
        let live = cuda_client.allocator().live_allocations();
        {
            let (h, tau) = cuda_client.qr(&a, QrMode::Raw, None).unwrap().into_pair().unwrap();
            assert_eq!(h.shape(), &[3, 2]);
            assert_eq!(tau.shape(), &[2]);
            assert_eq!(h.dtype(), DType::F64);
            assert_eq!(tau.dtype(), DType::F64);
            assert_eq!(cuda_client.allocator().live_allocations(), live + 2);
        }
        cuda_client.synchronize().unwrap();
        assert_eq!(cuda_client.allocator().live_allocations(), live);
    });
}
